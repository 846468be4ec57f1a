//! Configuration consumed by extractors and responders.
//!
//! A [`Config`] bundles the decode rules for query and form data, the JSON codec, the validation
//! engine, the logger and an optional custom error hook. Handlers either pin a config explicitly
//! (see [`FnHandler::with_config`](crate::FnHandler::with_config)) or read the process-wide one,
//! which is lazily defaulted on first access and replaced wholesale by [`configure`].

use crate::schema::SchemaDecoder;
use crate::validate::{DefaultValidator, Validate, Validator};
use crate::writer::ResponseWriter;
use crate::BoxError;
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Streams a JSON document for the value into the writer.
pub type JsonEncodeFn = Arc<dyn Fn(&mut dyn io::Write, &serde_json::Value) -> Result<(), BoxError> + Send + Sync>;
/// Renders a JSON document for the value into bytes.
pub type JsonMarshalFn = Arc<dyn Fn(&serde_json::Value) -> Result<Vec<u8>, BoxError> + Send + Sync>;
/// Parses a JSON document.
pub type JsonUnmarshalFn = Arc<dyn Fn(&[u8]) -> Result<serde_json::Value, BoxError> + Send + Sync>;
/// Takes full responsibility for writing an error response.
pub type ErrorHandlerFn = Arc<dyn Fn(&ResponseWriter, &BoxError) + Send + Sync>;

#[derive(Clone)]
pub struct Config {
    schema_decoder: SchemaDecoder,
    json_encode: Option<JsonEncodeFn>,
    json_marshal: Option<JsonMarshalFn>,
    json_unmarshal: Option<JsonUnmarshalFn>,
    validation: bool,
    validator: Option<Arc<dyn Validator>>,
    logger: Option<tracing::Dispatch>,
    error_handler: Option<ErrorHandlerFn>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_decoder: SchemaDecoder::default(),
            json_encode: None,
            json_marshal: None,
            json_unmarshal: None,
            validation: true,
            validator: None,
            logger: None,
            error_handler: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_schema_decoder(mut self, decoder: SchemaDecoder) -> Self {
        self.schema_decoder = decoder;
        self
    }

    /// Replaces the streaming JSON encoder, takes precedence over [`Config::with_json_marshal`].
    #[must_use]
    pub fn with_json_encode<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn io::Write, &serde_json::Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.json_encode = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_json_marshal<F>(mut self, f: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        self.json_marshal = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_json_unmarshal<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) -> Result<serde_json::Value, BoxError> + Send + Sync + 'static,
    {
        self.json_unmarshal = Some(Arc::new(f));
        self
    }

    /// Turns validation of JSON, query and form payloads on or off, it is on by default.
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Routes the adapter's own log events to `dispatch` instead of the global subscriber.
    #[must_use]
    pub fn with_logger(mut self, dispatch: tracing::Dispatch) -> Self {
        self.logger = Some(dispatch);
        self
    }

    #[must_use]
    pub fn with_error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResponseWriter, &BoxError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(f));
        self
    }

    pub fn schema_decoder(&self) -> &SchemaDecoder {
        &self.schema_decoder
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation
    }

    pub fn error_handler(&self) -> Option<&ErrorHandlerFn> {
        self.error_handler.as_ref()
    }

    /// Encodes `value` as JSON into `writer`.
    ///
    /// Uses the custom encoder if one is set, then the custom marshaller, and falls back to
    /// `serde_json` followed by a trailing newline. The fallback encodes the whole document
    /// before writing, a value that fails to serialize leaves `writer` untouched.
    pub fn json_encode<T>(&self, writer: &mut dyn io::Write, value: &T) -> Result<(), BoxError>
    where
        T: Serialize + ?Sized,
    {
        if let Some(encode) = &self.json_encode {
            return encode(writer, &serde_json::to_value(value)?);
        }

        if let Some(marshal) = &self.json_marshal {
            let data = marshal(&serde_json::to_value(value)?)?;
            writer.write_all(&data)?;
            return Ok(());
        }

        let mut data = serde_json::to_vec(value)?;
        data.push(b'\n');
        writer.write_all(&data)?;
        Ok(())
    }

    pub fn json_unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, BoxError> {
        match &self.json_unmarshal {
            Some(unmarshal) => Ok(serde_json::from_value(unmarshal(data)?)?),
            None => Ok(serde_json::from_slice(data)?),
        }
    }

    /// Runs the validation engine over `value`, a no-op while validation is disabled.
    pub fn validate<T: Validate>(&self, value: &T) -> Result<(), BoxError> {
        if !self.validation {
            return Ok(());
        }
        match &self.validator {
            Some(validator) => validator.validate(value),
            None => DefaultValidator.validate(value),
        }
    }

    /// Runs `f` with the configured logger as the current dispatcher.
    pub(crate) fn log(&self, f: impl FnOnce()) {
        match &self.logger {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("schema_decoder", &self.schema_decoder)
            .field("json_encode", &self.json_encode.is_some())
            .field("json_marshal", &self.json_marshal.is_some())
            .field("json_unmarshal", &self.json_unmarshal.is_some())
            .field("validation", &self.validation)
            .field("validator", &self.validator.is_some())
            .field("logger", &self.logger.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

static GLOBAL_CONFIG: Lazy<ArcSwap<Config>> = Lazy::new(|| ArcSwap::from_pointee(Config::default()));
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Returns a snapshot of the process-wide configuration.
pub fn current() -> Arc<Config> {
    GLOBAL_CONFIG.load_full()
}

/// Installs `config` process-wide, but only the first time it is called.
///
/// Returns whether `config` was installed. Later calls are ignored until [`reset`].
pub fn initialize(config: Config) -> bool {
    if INITIALIZED.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
        return false;
    }
    GLOBAL_CONFIG.store(Arc::new(config));
    true
}

/// Replaces the process-wide configuration, always effective.
pub fn configure(config: Config) {
    GLOBAL_CONFIG.store(Arc::new(config));
}

/// Restores the default configuration and re-arms [`initialize`].
pub fn reset() {
    GLOBAL_CONFIG.store(Arc::new(Config::default()));
    INITIALIZED.store(false, Ordering::Release);
}
