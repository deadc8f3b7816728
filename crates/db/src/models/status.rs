//! Status helper enums mapping to SMALLINT columns.
//!
//! Each enum variant's discriminant matches the 1-based id stored in the
//! corresponding `status_id` column.

/// Status ID type matching SMALLINT in the database.
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
    /// Track lifecycle status.
    TrackStatus {
        Draft = 1,
        Generating = 2,
        Ready = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Generation job status as observed by polling clients.
    JobStatus {
        Queued = 1,
        Running = 2,
        Succeeded = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Per-asset media download status on a track variant.
    DownloadStatus {
        Pending = 1,
        Downloading = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Durable queue job status.
    QueueStatus {
        Queued = 1,
        Running = 2,
        Completed = 3,
        Dead = 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_status_ids_are_stable() {
        assert_eq!(TrackStatus::Draft.id(), 1);
        assert_eq!(TrackStatus::Generating.id(), 2);
        assert_eq!(TrackStatus::Ready.id(), 3);
        assert_eq!(TrackStatus::Failed.id(), 4);
    }

    #[test]
    fn job_status_ids_are_stable() {
        assert_eq!(JobStatus::Queued.id(), 1);
        assert_eq!(JobStatus::Running.id(), 2);
        assert_eq!(JobStatus::Succeeded.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn download_status_ids_are_stable() {
        assert_eq!(DownloadStatus::Pending.id(), 1);
        assert_eq!(DownloadStatus::Downloading.id(), 2);
        assert_eq!(DownloadStatus::Completed.id(), 3);
        assert_eq!(DownloadStatus::Failed.id(), 4);
    }

    #[test]
    fn queue_status_ids_are_stable() {
        assert_eq!(QueueStatus::Queued.id(), 1);
        assert_eq!(QueueStatus::Running.id(), 2);
        assert_eq!(QueueStatus::Completed.id(), 3);
        assert_eq!(QueueStatus::Dead.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = JobStatus::Running.into();
        assert_eq!(id, 2);
    }
}
