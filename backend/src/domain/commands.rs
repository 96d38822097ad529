//! Domain-level command and result types.
//! These are used by services inside the domain layer; callers outside map the
//! public DTOs from the `shared` crate onto them.

pub mod parental_control {
    use shared::{ParentalControlRequest, ParentalControlResponse};

    /// Proof that the settings PIN was entered correctly.
    ///
    /// Only [`ParentalControlService`](crate::domain::ParentalControlService)
    /// hands these out; every PIN-gated operation takes one.
    #[derive(Debug, Clone)]
    pub struct AdminSession {
        _private: (),
    }

    impl AdminSession {
        pub(crate) fn grant() -> Self {
            Self { _private: () }
        }
    }

    /// Input for validating the settings PIN.
    #[derive(Debug, Clone)]
    pub struct ValidatePinCommand {
        pub answer: String,
    }

    impl From<ParentalControlRequest> for ValidatePinCommand {
        fn from(request: ParentalControlRequest) -> Self {
            Self {
                answer: request.answer,
            }
        }
    }

    /// Result of validating the settings PIN.
    #[derive(Debug, Clone)]
    pub struct ValidatePinResult {
        pub success: bool,
        pub message: String,
        pub session: Option<AdminSession>,
    }

    impl ValidatePinResult {
        pub fn to_response(&self) -> ParentalControlResponse {
            ParentalControlResponse {
                success: self.success,
                message: self.message.clone(),
            }
        }
    }
}

pub mod tasks {
    use shared::TaskCategory;

    /// Rename a task in place, keeping its position in the list.
    #[derive(Debug, Clone)]
    pub struct RenameTaskCommand {
        pub child_id: String,
        pub category: TaskCategory,
        pub from: String,
        pub to: String,
    }

    /// Add or remove a single task.
    #[derive(Debug, Clone)]
    pub struct TaskCommand {
        pub child_id: String,
        pub category: TaskCategory,
        pub label: String,
    }
}
