/*!
The [`Generator`] type.

A generator hands out one event source per event interface. The first request for an interface
synthesizes its event source, and every later request gets that same instance, for the lifetime of
the generator.
*/

use core::{
    any::{type_name, Any, TypeId},
    fmt,
};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::{
    config::{Configuration, FinalizedConfiguration},
    engine::TypeGenerator,
    error::GenerationError,
    interface::{EventInterface, InterfaceDescriptor},
    runtime::{self, EventSourceBase},
    setup::Setup,
    source::{ErrorHandler, EventSource, Fallback, Parts},
};

type Instance = Arc<dyn Any + Send + Sync>;
type Cell = Arc<OnceLock<Result<Instance, GenerationError>>>;

/**
Creates and caches event sources.
*/
pub struct Generator {
    configuration: FinalizedConfiguration,
    fallback: Option<Fallback>,
    on_error: ErrorHandler,
    types: TypeGenerator,
    instances: DashMap<TypeId, Cell>,
}

impl Default for Generator {
    fn default() -> Self {
        Setup::new().build()
    }
}

impl Generator {
    pub fn builder() -> Setup {
        Setup::new()
    }

    pub(crate) fn new(
        configuration: Configuration,
        fallback: Option<Fallback>,
        automatic_event_ids: bool,
        on_error: ErrorHandler,
    ) -> Self {
        Generator {
            configuration: configuration.finalize(),
            fallback,
            on_error,
            types: TypeGenerator::new(automatic_event_ids),
            instances: DashMap::new(),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        self.configuration.configuration()
    }

    pub fn automatic_event_ids(&self) -> bool {
        self.types.automatic_event_ids()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /**
    Get the event source for the interface `I`.

    ```
    # use std::sync::Arc;
    #[emit_source::event_interface]
    pub trait Startup {
        #[event(id: 1)]
        fn started(&self, version: String);
    }

    let generator = emit_source::Generator::default();

    let a = generator.get::<dyn Startup>()?;
    let b = generator.get::<dyn Startup>()?;

    assert!(Arc::ptr_eq(&a, &b));

    a.started(String::from("1.0.0"));
    # Ok::<(), emit_source::GenerationError>(())
    ```
    */
    pub fn get<I: EventInterface + ?Sized>(&self) -> Result<Arc<EventSource<I>>, GenerationError> {
        self.get_typed::<I>(None)
    }

    /**
    Get the event source for the interface `I`, merging `configuration` into the generator's own
    configuration if the event source doesn't exist yet.

    If the event source has already been created, the override is ignored.
    */
    pub fn get_with<I: EventInterface + ?Sized>(
        &self,
        configuration: &Configuration,
    ) -> Result<Arc<EventSource<I>>, GenerationError> {
        self.get_typed::<I>(Some(configuration))
    }

    /**
    Get the event source for an interface by its descriptor.

    The result is an `Arc<EventSource<I>>` for the interface `I` the descriptor was built for.
    */
    pub fn get_erased(
        &self,
        interface: &InterfaceDescriptor,
        configuration: Option<&Configuration>,
    ) -> Result<Arc<dyn Any + Send + Sync>, GenerationError> {
        self.get_or_create(
            interface.id(),
            interface.name(),
            || interface.clone(),
            configuration,
        )
    }

    fn get_typed<I: EventInterface + ?Sized>(
        &self,
        configuration: Option<&Configuration>,
    ) -> Result<Arc<EventSource<I>>, GenerationError> {
        self.get_or_create(TypeId::of::<I>(), type_name::<I>(), I::describe, configuration)?
            .downcast::<EventSource<I>>()
            .map_err(|_| GenerationError::InstanceMismatch {
                interface: type_name::<I>().to_owned(),
            })
    }

    fn get_or_create(
        &self,
        id: TypeId,
        name: &str,
        describe: impl FnOnce() -> InterfaceDescriptor,
        configuration: Option<&Configuration>,
    ) -> Result<Instance, GenerationError> {
        let cell = self.instances.entry(id).or_default().clone();

        let mut created = false;
        let instance = cell
            .get_or_init(|| {
                created = true;
                self.create(&describe(), configuration)
            })
            .clone();

        if !created && configuration.is_some() {
            tracing::warn!(
                interface = name,
                "the event source already exists, so its configuration override is ignored"
            );
        }

        instance
    }

    fn create(
        &self,
        interface: &InterfaceDescriptor,
        configuration: Option<&Configuration>,
    ) -> Result<Instance, GenerationError> {
        let configuration = match configuration {
            Some(configuration) => self.configuration.merge(configuration),
            None => self.configuration.clone(),
        };

        let generated = self.types.generate(interface, &configuration)?;

        let base = Arc::new(EventSourceBase::new(
            generated.provider_name(),
            generated.guid(),
            generated.manifest(),
        ));
        runtime::register(&base);

        Ok(interface.instantiate(Parts {
            generated,
            base,
            fallback: self.fallback.clone(),
            on_error: self.on_error.clone(),
        }))
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("configuration", &self.configuration)
            .field("automatic_event_ids", &self.automatic_event_ids())
            .field("instances", &self.instances.len())
            .finish()
    }
}
