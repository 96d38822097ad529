use shared::ParentalControlRequest;
use tracing::info;

use super::commands::parental_control::{AdminSession, ValidatePinCommand, ValidatePinResult};
use super::state_store::StateStore;

/// Service for checking the settings PIN
#[derive(Clone)]
pub struct ParentalControlService {
    store: StateStore,
}

impl ParentalControlService {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Compare an entered PIN with the stored one.
    ///
    /// Plain string equality: no trimming, no case folding, no attempt counter.
    /// A mismatch changes nothing and simply yields no session.
    pub async fn validate_pin(&self, command: ValidatePinCommand) -> ValidatePinResult {
        info!("Validating settings PIN (length: {})", command.answer.len());

        let is_correct = self.store.read(|state| state.pin == command.answer).await;

        if is_correct {
            info!("Settings PIN accepted");
            ValidatePinResult {
                success: true,
                message: "Access granted! Welcome to settings.".to_string(),
                session: Some(AdminSession::grant()),
            }
        } else {
            info!("Settings PIN rejected");
            ValidatePinResult {
                success: false,
                message: "Incorrect PIN. Access denied.".to_string(),
                session: None,
            }
        }
    }

    /// Same as [`validate_pin`](Self::validate_pin) for the public request type
    pub async fn validate_request(&self, request: ParentalControlRequest) -> ValidatePinResult {
        self.validate_pin(request.into()).await
    }
}
