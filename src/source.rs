/*!
The [`EventSource`] type.

An event source is the generated implementation of an event interface. Each method call goes through
two stages:

1. The event's level and keywords are checked against the attached listeners. If nobody is listening
   the call returns straight away, without converting any arguments.
2. Every payload slot is resolved in order, either from the argument itself, from a conversion
   function, or through the fallback converter. The complete payload is then written.
*/

use core::{
    any::{Any, TypeId},
    fmt,
    marker::PhantomData,
    ops::Deref,
};
use std::sync::Arc;

use crate::{
    engine::{
        Emission, EventDescriptor, EventInterfaceDescriptor, GeneratedType, Origin,
        ParameterDescriptor,
    },
    error::CallTimeError,
    interface::Disposable,
    runtime::EventSourceBase,
    validity::{TypeDescriptor, Unsupported},
    value::Payload,
};

/**
Formats values that can't be written natively.

Returning `None` writes empty text.
*/
pub type Fallback = Arc<dyn Fn(Unsupported<'_>) -> Option<String> + Send + Sync>;

/**
Handles failures raised while writing an event through a trait method.
*/
pub type ErrorHandler = Arc<dyn Fn(&CallTimeError) + Send + Sync>;

pub(crate) fn default_error_handler() -> ErrorHandler {
    Arc::new(|err: &CallTimeError| {
        tracing::error!(error = %err, "failed to write event");
    })
}

pub(crate) struct Parts {
    pub(crate) generated: Arc<GeneratedType>,
    pub(crate) base: Arc<EventSourceBase>,
    pub(crate) fallback: Option<Fallback>,
    pub(crate) on_error: ErrorHandler,
}

/**
A generated event source for the interface `I`.

An `EventSource<I>` implements the trait `I` along with its base interfaces, and dereferences to its
[`EventSourceBase`].

An event source can't be used as an interface it wasn't generated for:

```compile_fail
#[emit_source::event_interface]
pub trait Shipping {
    #[event(id: 1)]
    fn shipped(&self, order: u64);
}

#[emit_source::event_interface]
pub trait Billing {
    #[event(id: 1)]
    fn billed(&self, order: u64);
}

fn bill(billing: &dyn Billing) {
    billing.billed(1);
}

let generator = emit_source::Generator::default();
let shipping = generator.get::<dyn Shipping>()?;

bill(&*shipping);
# Ok::<(), emit_source::GenerationError>(())
```
*/
pub struct EventSource<I: ?Sized> {
    generated: Arc<GeneratedType>,
    base: Arc<EventSourceBase>,
    fallback: Option<Fallback>,
    on_error: ErrorHandler,
    _marker: PhantomData<fn(&I)>,
}

impl<I: ?Sized + 'static> EventSource<I> {
    pub(crate) fn instantiate(parts: Parts) -> Arc<dyn Any + Send + Sync> {
        Arc::new(EventSource::<I>::from_parts(parts))
    }
}

impl<I: ?Sized> EventSource<I> {
    pub(crate) fn from_parts(parts: Parts) -> Self {
        EventSource {
            generated: parts.generated,
            base: parts.base,
            fallback: parts.fallback,
            on_error: parts.on_error,
            _marker: PhantomData,
        }
    }

    /**
    The generated type's full name.
    */
    pub fn name(&self) -> &str {
        self.generated.name()
    }

    pub fn provider_name(&self) -> &str {
        self.generated.provider_name()
    }

    pub fn events(&self) -> &EventInterfaceDescriptor {
        self.generated.events()
    }

    pub fn generated(&self) -> &Arc<GeneratedType> {
        &self.generated
    }

    pub fn base(&self) -> &Arc<EventSourceBase> {
        &self.base
    }

    /**
    Write the event for the method at `index` declared by `interface`, with the given arguments.
    */
    pub fn invoke(
        &self,
        interface: TypeId,
        index: usize,
        args: &[&dyn Any],
    ) -> Result<(), CallTimeError> {
        let Some(event) = self.generated.method(interface, index) else {
            return Err(CallTimeError::UnknownMethod {
                interface: self.generated.name().to_owned(),
                index,
            });
        };

        if !self.base.is_enabled(event.level(), event.keywords().or_all()) {
            return Ok(());
        }

        if args.len() != event.arity() {
            return Err(CallTimeError::ArgumentCount {
                method: event.qualified_name().to_owned(),
                expected: event.arity(),
                actual: args.len(),
            });
        }

        let functions = self.generated.configuration().functions();

        let mut payload = Vec::with_capacity(event.params().len());
        for param in event.params() {
            let input: &dyn Any = match param.origin() {
                Origin::Argument(position) => args[position],
                Origin::Parameter => &(),
            };

            let value = match param.slot() {
                None => self.resolve(event, param, param.declared_type(), input)?,
                Some(slot) => {
                    let mut resolved = None;
                    let called = functions.call(slot, input, &mut |output: &dyn Any| {
                        resolved = Some(self.resolve(event, param, param.value_type(), output));
                    });

                    match resolved {
                        Some(value) if called => value?,
                        _ => return Err(argument_type(event, param, param.declared_type())),
                    }
                }
            };

            payload.push(value);
        }

        if payload.is_empty() {
            self.base.write_event_empty(event.id());
        } else {
            self.base.write_event(event.id(), &payload);
        }

        Ok(())
    }

    /**
    Write an event, passing any failure to the configured error handler.
    */
    pub fn dispatch(&self, interface: TypeId, index: usize, args: &[&dyn Any]) {
        if let Err(err) = self.invoke(interface, index, args) {
            (self.on_error)(&err);
        }
    }

    fn resolve(
        &self,
        event: &EventDescriptor,
        param: &ParameterDescriptor,
        ty: &TypeDescriptor,
        value: &dyn Any,
    ) -> Result<Payload, CallTimeError> {
        match param.emission() {
            Emission::Native => ty
                .to_payload(value)
                .ok_or_else(|| argument_type(event, param, ty)),
            Emission::Text => {
                if (*value).type_id() != ty.id() {
                    return Err(argument_type(event, param, ty));
                }

                let Some(ref fallback) = self.fallback else {
                    return Err(CallTimeError::MissingFallback {
                        ty: ty.name().to_owned(),
                        method: event.qualified_name().to_owned(),
                        parameter: param.name().to_owned(),
                    });
                };

                Ok(fallback(Unsupported::new(value, ty))
                    .map(Payload::Str)
                    .unwrap_or_else(Payload::empty_str))
            }
        }
    }
}

fn argument_type(
    event: &EventDescriptor,
    param: &ParameterDescriptor,
    ty: &TypeDescriptor,
) -> CallTimeError {
    CallTimeError::ArgumentType {
        ty: ty.name().to_owned(),
        method: event.qualified_name().to_owned(),
        parameter: param.name().to_owned(),
    }
}

impl<I: ?Sized> Deref for EventSource<I> {
    type Target = EventSourceBase;

    fn deref(&self) -> &EventSourceBase {
        &self.base
    }
}

impl<I: ?Sized> Disposable for EventSource<I> {
    fn dispose(&self) {
        self.base.dispose()
    }
}

impl<I: ?Sized> fmt::Debug for EventSource<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.generated.name())
            .field("provider", &self.generated.provider_name())
            .field("events", &self.generated.events().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::{
        config::Configuration,
        engine::TypeGenerator,
        interface::{EventAttributes, EventInterface, InterfaceDescriptor},
        keywords::Keywords,
        level::Level,
        runtime::{from_fn, EventWritten},
        validity::Argument,
    };

    #[derive(Debug)]
    struct CustomData(i32);

    impl Argument for CustomData {}

    trait Log {}

    impl EventInterface for dyn Log {
        fn describe() -> InterfaceDescriptor {
            InterfaceDescriptor::builder::<dyn Log>("Log", module_path!())
                .method("custom", |m| {
                    m.event(EventAttributes::new().id(1))
                        .param::<CustomData>("data")
                })
                .method("counted", |m| {
                    m.event(EventAttributes::new().id(2).level(Level::Verbose))
                        .param::<i32>("count")
                        .param::<Option<String>>("label")
                })
                .method("empty", |m| m.event(EventAttributes::new().id(3)))
                .build()
        }
    }

    fn source(
        configuration: &Configuration,
        fallback: Option<Fallback>,
    ) -> (EventSource<dyn Log>, Arc<Mutex<Vec<(u32, Vec<Payload>)>>>) {
        let generated = TypeGenerator::new(false)
            .generate(&<dyn Log>::describe(), &configuration.finalize())
            .unwrap();

        let base = Arc::new(EventSourceBase::new(
            generated.provider_name(),
            generated.guid(),
            generated.manifest(),
        ));

        let written = Arc::new(Mutex::new(Vec::new()));

        let source = EventSource::from_parts(Parts {
            generated,
            base,
            fallback,
            on_error: default_error_handler(),
        });

        (source, written)
    }

    fn listen(source: &EventSource<dyn Log>, written: &Arc<Mutex<Vec<(u32, Vec<Payload>)>>>) {
        let written = written.clone();
        source.enable(
            from_fn(move |evt: &EventWritten| {
                written
                    .lock()
                    .unwrap()
                    .push((evt.id(), evt.payload().to_vec()))
            }),
            Level::Verbose,
            Keywords::NONE,
        );
    }

    fn fallback(
        f: impl Fn(Unsupported<'_>) -> Option<String> + Send + Sync + 'static,
    ) -> Option<Fallback> {
        Some(Arc::new(f))
    }

    fn log() -> TypeId {
        TypeId::of::<dyn Log>()
    }

    #[test]
    fn disabled_sources_do_no_work() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let (source, written) = source(
            &Configuration::empty(),
            fallback(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
                None
            }),
        );

        source.invoke(log(), 0, &[&CustomData(1)]).unwrap();

        // Arguments aren't checked while disabled
        source.invoke(log(), 1, &[]).unwrap();

        assert_eq!(0, calls.load(Ordering::Relaxed));
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn native_and_nullable_arguments() {
        let (source, written) = source(&Configuration::empty(), None);
        listen(&source, &written);

        source.invoke(log(), 1, &[&42i32, &None::<String>]).unwrap();
        source.invoke(log(), 1, &[&1i32, &Some(String::from("a"))]).unwrap();
        source.invoke(log(), 2, &[]).unwrap();

        assert_eq!(
            vec![
                (2, vec![Payload::I32(42), Payload::empty_str()]),
                (2, vec![Payload::I32(1), Payload::from("a")]),
                (3, vec![]),
            ],
            *written.lock().unwrap()
        );
    }

    #[test]
    fn fallback_formats_unsupported_values() {
        let (source, written) = source(
            &Configuration::empty(),
            fallback(|value| {
                value
                    .downcast_ref::<CustomData>()
                    .filter(|data| data.0 != 0)
                    .map(|data| format!("custom {}", data.0))
            }),
        );
        listen(&source, &written);

        source.invoke(log(), 0, &[&CustomData(7)]).unwrap();
        source.invoke(log(), 0, &[&CustomData(0)]).unwrap();

        assert_eq!(
            vec![
                (1, vec![Payload::from("custom 7")]),
                (1, vec![Payload::empty_str()]),
            ],
            *written.lock().unwrap()
        );
    }

    #[test]
    fn missing_fallback_fails_before_writing() {
        let (source, written) = source(&Configuration::empty(), None);
        listen(&source, &written);

        let err = source.invoke(log(), 0, &[&CustomData(1)]).unwrap_err();

        assert!(matches!(
            err,
            CallTimeError::MissingFallback { ref parameter, .. } if parameter == "data"
        ));
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn mapped_arguments() {
        let config = Configuration::empty()
            .with_mapping::<CustomData>(|m| m.map(|data| data.0 * 2))
            .unwrap()
            .with_additional_parameter(|| String::from("extra"), "extra")
            .unwrap();

        let (source, written) = source(&config, None);
        listen(&source, &written);

        source.invoke(log(), 0, &[&CustomData(4)]).unwrap();
        source.invoke(log(), 2, &[]).unwrap();

        assert_eq!(
            vec![
                (1, vec![Payload::I32(8), Payload::from("extra")]),
                (3, vec![Payload::from("extra")]),
            ],
            *written.lock().unwrap()
        );
    }

    #[test]
    fn mismatched_arguments() {
        let (source, written) = source(&Configuration::empty(), None);
        listen(&source, &written);

        assert!(matches!(
            source.invoke(log(), 1, &[&1i32]).unwrap_err(),
            CallTimeError::ArgumentCount {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert!(matches!(
            source.invoke(log(), 1, &[&1u8, &None::<String>]).unwrap_err(),
            CallTimeError::ArgumentType { ref parameter, .. } if parameter == "count"
        ));
        assert!(matches!(
            source.invoke(log(), 9, &[]).unwrap_err(),
            CallTimeError::UnknownMethod { index: 9, .. }
        ));

        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn dispatch_reports_errors() {
        let (mut source, written) = source(&Configuration::empty(), None);
        listen(&source, &written);

        let errors = Arc::new(Mutex::new(Vec::new()));

        let captured = errors.clone();
        source.on_error =
            Arc::new(move |err: &CallTimeError| captured.lock().unwrap().push(err.clone()));

        source.dispatch(log(), 0, &[&CustomData(1)]);

        assert_eq!(1, errors.lock().unwrap().len());
    }

    #[test]
    fn dispose_disables() {
        let (source, written) = source(&Configuration::empty(), None);
        listen(&source, &written);

        source.dispose();
        source.invoke(log(), 2, &[]).unwrap();

        assert!(written.lock().unwrap().is_empty());
    }
}
