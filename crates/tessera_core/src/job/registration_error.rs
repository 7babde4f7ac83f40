use crate::ecs::PrimitiveKind;
use thiserror::Error;

/// Errors that can occur while registering a parallel job.
#[derive(Debug, Error)]
pub enum JobRegistrationError {
    #[error("job '{job}' is already registered")]
    DuplicateJob { job: &'static str },

    #[error("job '{job}' reads component '{component}', which is not registered")]
    UnregisteredComponent {
        job: &'static str,
        component: &'static str,
    },

    #[error("job '{job}' requests '{chain}' of '{component}', which is not a primitive field")]
    InvalidAccessChain {
        job: &'static str,
        component: &'static str,
        chain: String,
    },

    #[error("job '{job}' reads '{component}.{chain}' as {requested}, but the field is {actual}")]
    FieldTypeMismatch {
        job: &'static str,
        component: &'static str,
        chain: String,
        requested: PrimitiveKind,
        actual: PrimitiveKind,
    },

    #[error("job '{job}' declares external key '{key}' more than once")]
    DuplicateExternalKey { job: &'static str, key: String },
}
