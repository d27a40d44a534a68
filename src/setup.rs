use std::sync::Arc;

use crate::{
    config::Configuration,
    error::CallTimeError,
    generator::Generator,
    source::{default_error_handler, ErrorHandler, Fallback},
    validity::Unsupported,
};

/**
Configure a [`Generator`].

```
let generator = emit_source::Generator::builder()
    .automatic_event_ids(true)
    .debug_fallback()
    .build();
```
*/
pub struct Setup {
    configuration: Configuration,
    fallback: Option<Fallback>,
    automatic_event_ids: bool,
    on_error: ErrorHandler,
}

impl Default for Setup {
    fn default() -> Self {
        Self::new()
    }
}

impl Setup {
    pub fn new() -> Self {
        Setup {
            configuration: Configuration::empty(),
            fallback: None,
            automatic_event_ids: false,
            on_error: default_error_handler(),
        }
    }

    /**
    The configuration used for every event source, unless a request supplies an override.
    */
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    /**
    Format values that have no mapping rule and can't be written natively.

    Without a fallback, writing such a value fails.
    */
    pub fn fallback(
        mut self,
        fallback: impl Fn(Unsupported<'_>) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /**
    Format unsupported values using their `Debug` implementation.

    Absent values are written as empty text.
    */
    pub fn debug_fallback(self) -> Self {
        self.fallback(|value| {
            if value.is_none() {
                None
            } else {
                Some(format!("{:?}", value))
            }
        })
    }

    /**
    Assign ids to event methods that don't declare one.

    Assigned ids follow the highest explicit id of the interface. This is off by default, so every
    method needs an explicit id.
    */
    pub fn automatic_event_ids(mut self, automatic_event_ids: bool) -> Self {
        self.automatic_event_ids = automatic_event_ids;
        self
    }

    /**
    Handle failures raised while writing events through trait methods.

    By default failures are logged through `tracing` and the event is dropped.
    */
    pub fn on_call_error(
        mut self,
        on_error: impl Fn(&CallTimeError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Arc::new(on_error);
        self
    }

    pub fn build(self) -> Generator {
        Generator::new(
            self.configuration,
            self.fallback,
            self.automatic_event_ids,
            self.on_error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let generator = Setup::new().build();

        assert!(!generator.automatic_event_ids());
        assert_eq!(0, generator.configuration().mapping_count());
        assert!(!generator.has_fallback());
    }

    #[test]
    fn options() {
        let generator = Setup::new()
            .configuration(
                Configuration::empty()
                    .with_additional_parameter(|| 1, "one")
                    .unwrap(),
            )
            .automatic_event_ids(true)
            .debug_fallback()
            .on_call_error(|_| {})
            .build();

        assert!(generator.automatic_event_ids());
        assert_eq!(1, generator.configuration().parameter_count());
        assert!(generator.has_fallback());
    }
}
