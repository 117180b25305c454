//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table created by the initial migration.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Per-service sub-status for external processing stages
    /// (capture blur, hailpad depth map, hailpad analysis).
    ServiceStatus {
        Pending = 1,
        Uploading = 2,
        Processing = 3,
        Complete = 4,
        Failed = 5,
    }
}

define_status_enum! {
    /// Overall or single-stage processing status
    /// (path, panorama lookup, scan conversion, hailpad overall).
    ProcessStatus {
        Pending = 1,
        InProgress = 2,
        Complete = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Queued job execution status.
    JobStatus {
        Pending = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Origin of a capture image.
    CaptureSource {
        Device = 1,
        Panorama = 2,
    }
}

impl ServiceStatus {
    /// Map a raw status ID back to the enum. `None` for unknown IDs.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Uploading),
            3 => Some(Self::Processing),
            4 => Some(Self::Complete),
            5 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Complete and Failed admit no further automated transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl ProcessStatus {
    /// Map a raw status ID back to the enum. `None` for unknown IDs.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::InProgress),
            3 => Some(Self::Complete),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Complete and Failed admit no further automated transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl JobStatus {
    /// Map a raw status ID back to the enum. `None` for unknown IDs.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Running),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_status_ids_match_seed_data() {
        assert_eq!(ServiceStatus::Pending.id(), 1);
        assert_eq!(ServiceStatus::Uploading.id(), 2);
        assert_eq!(ServiceStatus::Processing.id(), 3);
        assert_eq!(ServiceStatus::Complete.id(), 4);
        assert_eq!(ServiceStatus::Failed.id(), 5);
    }

    #[test]
    fn process_status_ids_match_seed_data() {
        assert_eq!(ProcessStatus::Pending.id(), 1);
        assert_eq!(ProcessStatus::InProgress.id(), 2);
        assert_eq!(ProcessStatus::Complete.id(), 3);
        assert_eq!(ProcessStatus::Failed.id(), 4);
    }

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Running.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = ServiceStatus::Pending.into();
        assert_eq!(id, 1);
    }

    #[test]
    fn terminal_states_are_exactly_complete_and_failed() {
        assert!(ServiceStatus::Complete.is_terminal());
        assert!(ServiceStatus::Failed.is_terminal());
        assert!(!ServiceStatus::Pending.is_terminal());
        assert!(!ServiceStatus::Uploading.is_terminal());
        assert!(!ServiceStatus::Processing.is_terminal());

        assert!(ProcessStatus::Complete.is_terminal());
        assert!(ProcessStatus::Failed.is_terminal());
        assert!(!ProcessStatus::Pending.is_terminal());
        assert!(!ProcessStatus::InProgress.is_terminal());
    }

    #[test]
    fn from_id_round_trips_and_rejects_unknown() {
        assert_eq!(ServiceStatus::from_id(4), Some(ServiceStatus::Complete));
        assert_eq!(ServiceStatus::from_id(99), None);
        assert_eq!(ProcessStatus::from_id(2), Some(ProcessStatus::InProgress));
        assert_eq!(ProcessStatus::from_id(0), None);
    }
}
