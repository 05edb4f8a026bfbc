pub mod capture;
pub mod collected;
pub mod error;
pub mod fire;
pub mod identity;
pub mod injection;
pub mod paging;
pub mod settings;
pub mod token;

pub use capture::{Capture, CaptureError};
pub use collected::CollectedPage;
pub use error::{ErrorCode, ErrorReport};
pub use fire::{NewPayloadFire, NewSecret, PayloadFire, Secret, NO_CORRELATED_REQUEST};
pub use identity::User;
pub use injection::{InjectionRequest, RecordInjectionRequest, RecordOutcome};
pub use paging::PageRequest;
pub use settings::{OwnerSettings, SettingsError, SettingsUpdate};
