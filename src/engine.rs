/*!
Event source synthesis.

The [`TypeGenerator`] turns an [`InterfaceDescriptor`] and a finalized configuration into a
[`GeneratedType`]: the provider's identity, one [`EventDescriptor`] per interface method, and the
pipeline of [`ParameterDescriptor`]s each method's arguments go through before they're written.

All the decisions about how an event is written are made here, once per interface. Calls against a
generated event source only follow the plan.
*/

use core::any::TypeId;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock},
};

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    config::FinalizedConfiguration,
    error::GenerationError,
    interface::{EventAttributes, InterfaceDescriptor, Member, MethodDescriptor},
    keywords::{Keywords, Opcode},
    level::Level,
    runtime::EventMetadata,
    validity::{short_type_name, TypeDescriptor},
};

/**
The namespace provider GUIDs are derived in.
*/
const PROVIDER_NAMESPACE: Uuid = Uuid::from_u128(0x482c2db2_c390_47c8_87f8_1a15bfc130fb);

/**
Where a pipeline slot's value comes from.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /** The call argument at this position. */
    Argument(usize),
    /** An additional parameter from the configuration. */
    Parameter,
}

/**
How a pipeline slot's value is written.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /** Written as its own payload kind. */
    Native,
    /** Formatted by the fallback converter and written as text. */
    Text,
}

/**
One slot of an event's payload.
*/
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    declared: TypeDescriptor,
    value: TypeDescriptor,
    emission: Emission,
    origin: Origin,
    slot: Option<usize>,
    name: Arc<str>,
}

impl ParameterDescriptor {
    fn new(
        declared: TypeDescriptor,
        value: TypeDescriptor,
        origin: Origin,
        slot: Option<usize>,
        name: Arc<str>,
    ) -> Self {
        ParameterDescriptor {
            declared,
            value,
            emission: if value.is_native() {
                Emission::Native
            } else {
                Emission::Text
            },
            origin,
            slot,
            name,
        }
    }

    /**
    The type of the argument, or of the additional parameter's value.
    */
    pub fn declared_type(&self) -> &TypeDescriptor {
        &self.declared
    }

    /**
    The type of the value once any conversion function has run.
    */
    pub fn value_type(&self) -> &TypeDescriptor {
        &self.value
    }

    pub fn emission(&self) -> Emission {
        self.emission
    }

    /**
    The name of the payload kind this slot is written as.
    */
    pub fn emitted_type(&self) -> &'static str {
        match self.emission {
            Emission::Native => self.value.name(),
            Emission::Text => "alloc::string::String",
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /**
    The finalized slot of the conversion function that produces this value, if any.
    */
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/**
The plan for one event method.
*/
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    id: u32,
    name: String,
    qualified_name: String,
    attributes: EventAttributes,
    declaring: TypeId,
    index: usize,
    arity: usize,
    params: Vec<ParameterDescriptor>,
}

impl EventDescriptor {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /**
    The method name, qualified by the interface that declares it.
    */
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn level(&self) -> Level {
        self.attributes.level
    }

    pub fn keywords(&self) -> Keywords {
        self.attributes.keywords
    }

    pub fn opcode(&self) -> Opcode {
        self.attributes.opcode
    }

    pub fn task(&self) -> u16 {
        self.attributes.task
    }

    pub fn version(&self) -> u8 {
        self.attributes.version
    }

    pub fn message(&self) -> Option<&str> {
        self.attributes.message.as_deref()
    }

    /**
    The interface that declares this method.
    */
    pub fn declaring_interface(&self) -> TypeId {
        self.declaring
    }

    /**
    The method's position among its declaring interface's methods.
    */
    pub fn index(&self) -> usize {
        self.index
    }

    /**
    The number of arguments the method is called with.
    */
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    fn metadata(&self) -> EventMetadata {
        EventMetadata {
            id: self.id,
            name: self.name.clone(),
            level: self.attributes.level,
            keywords: self.attributes.keywords,
            opcode: self.attributes.opcode,
            task: self.attributes.task,
            version: self.attributes.version,
            message: self.attributes.message.clone(),
            payload_names: self.params.iter().map(|param| param.name.clone()).collect(),
        }
    }
}

/**
The events of an interface and all of its ancestors, base interfaces first.
*/
#[derive(Debug, Clone, Default)]
pub struct EventInterfaceDescriptor {
    events: Vec<EventDescriptor>,
}

impl EventInterfaceDescriptor {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventDescriptor> {
        self.events.iter()
    }

    pub fn get(&self, id: u32) -> Option<&EventDescriptor> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.iter().find(|event| event.name == name)
    }
}

impl<'a> IntoIterator for &'a EventInterfaceDescriptor {
    type Item = &'a EventDescriptor;
    type IntoIter = std::slice::Iter<'a, EventDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/**
The product of synthesizing an event interface.
*/
#[derive(Debug)]
pub struct GeneratedType {
    interface: TypeId,
    name: String,
    short_name: String,
    provider_name: String,
    guid: Uuid,
    events: EventInterfaceDescriptor,
    methods: HashMap<(TypeId, usize), usize>,
    configuration: FinalizedConfiguration,
}

impl GeneratedType {
    pub fn interface(&self) -> TypeId {
        self.interface
    }

    /**
    The generated type's full name, like `my_app::events::RequestLog`.
    */
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn events(&self) -> &EventInterfaceDescriptor {
        &self.events
    }

    pub fn configuration(&self) -> &FinalizedConfiguration {
        &self.configuration
    }

    /**
    Find the event for the method at `index` declared by `interface`.
    */
    pub fn method(&self, interface: TypeId, index: usize) -> Option<&EventDescriptor> {
        self.methods
            .get(&(interface, index))
            .and_then(|event| self.events.events.get(*event))
    }

    /**
    The provider manifest for this type's events.
    */
    pub fn manifest(&self) -> Vec<EventMetadata> {
        self.events.iter().map(EventDescriptor::metadata).collect()
    }
}

type Cell = Arc<OnceLock<Result<Arc<GeneratedType>, GenerationError>>>;

/**
Synthesizes generated types and caches them by interface.
*/
#[derive(Default)]
pub struct TypeGenerator {
    automatic_event_ids: bool,
    cache: DashMap<TypeId, Cell>,
}

impl TypeGenerator {
    pub fn new(automatic_event_ids: bool) -> Self {
        TypeGenerator {
            automatic_event_ids,
            cache: DashMap::new(),
        }
    }

    pub fn automatic_event_ids(&self) -> bool {
        self.automatic_event_ids
    }

    /**
    Get the generated type for an interface, synthesizing it on first use.

    The configuration is only used when the type is synthesized. Failed synthesis isn't cached, so a
    later call tries again.
    */
    pub fn generate(
        &self,
        interface: &InterfaceDescriptor,
        configuration: &FinalizedConfiguration,
    ) -> Result<Arc<GeneratedType>, GenerationError> {
        let cell = self.cache.entry(interface.id()).or_default().clone();

        let generated = cell
            .get_or_init(|| self.synthesize(interface, configuration).map(Arc::new))
            .clone();

        if generated.is_err() {
            self.cache
                .remove_if(&interface.id(), |_, cached| Arc::ptr_eq(cached, &cell));
        }

        generated
    }

    fn synthesize(
        &self,
        interface: &InterfaceDescriptor,
        configuration: &FinalizedConfiguration,
    ) -> Result<GeneratedType, GenerationError> {
        let short_name = generated_name(interface.name()).to_owned();
        let name = format!("{}::{}", interface.module_path(), short_name);
        let provider_name = provider_name(interface, &short_name);
        let guid = provider_guid(&provider_name);

        let mut seen = HashSet::new();
        seen.insert(interface.id());

        let mut methods = Vec::new();
        declared_methods(interface, &mut seen, &mut methods)?;

        let ids = self.assign_ids(&methods)?;

        let mut events = Vec::with_capacity(methods.len());
        let mut lookup = HashMap::with_capacity(methods.len());

        for (declared, id) in methods.into_iter().zip(ids) {
            lookup.insert((declared.declaring, declared.index), events.len());

            events.push(EventDescriptor {
                id,
                name: declared.method.name().to_owned(),
                qualified_name: format!("{}::{}", declared.interface, declared.method.name()),
                attributes: declared.method.attributes().clone(),
                declaring: declared.declaring,
                index: declared.index,
                arity: declared.method.params().len(),
                params: pipeline(&declared.method, configuration),
            });
        }

        tracing::debug!(
            interface = %name,
            provider = %provider_name,
            events = events.len(),
            "generated event source"
        );

        Ok(GeneratedType {
            interface: interface.id(),
            name,
            short_name,
            provider_name,
            guid,
            events: EventInterfaceDescriptor { events },
            methods: lookup,
            configuration: configuration.clone(),
        })
    }

    fn assign_ids(&self, methods: &[DeclaredMethod]) -> Result<Vec<u32>, GenerationError> {
        let mut explicit = HashSet::new();

        for declared in methods {
            if let Some(id) = declared.method.attributes().id {
                if !explicit.insert(id) {
                    return Err(GenerationError::DuplicateEventId {
                        interface: declared.interface.clone(),
                        method: declared.method.name().to_owned(),
                        id,
                    });
                }
            }
        }

        let mut highest = explicit.iter().copied().max().unwrap_or(0);

        methods
            .iter()
            .map(|declared| match declared.method.attributes().id {
                Some(id) => Ok(id),
                None if self.automatic_event_ids => {
                    let Some(id) = highest.checked_add(1) else {
                        return Err(GenerationError::EventIdOverflow {
                            interface: declared.interface.clone(),
                            method: declared.method.name().to_owned(),
                            highest,
                        });
                    };
                    highest = id;

                    tracing::trace!(
                        interface = %declared.interface,
                        method = declared.method.name(),
                        id,
                        "assigned event id"
                    );

                    Ok(id)
                }
                None => Err(GenerationError::MissingEventId {
                    interface: declared.interface.clone(),
                    method: declared.method.name().to_owned(),
                }),
            })
            .collect()
    }
}

struct DeclaredMethod {
    declaring: TypeId,
    interface: String,
    index: usize,
    method: MethodDescriptor,
}

/**
Collect the methods of `interface` and its ancestors, depth-first with bases before the interfaces
that extend them.

Every ancestor appears once, however many paths lead to it. Disposal is never collected.
*/
fn declared_methods(
    interface: &InterfaceDescriptor,
    seen: &mut HashSet<TypeId>,
    methods: &mut Vec<DeclaredMethod>,
) -> Result<(), GenerationError> {
    for base in interface.bases() {
        if base.is_disposable() || !seen.insert(base.id()) {
            continue;
        }

        declared_methods(&base.describe(), seen, methods)?;
    }

    let qualified = format!("{}::{}", interface.module_path(), interface.name());

    let mut index = 0;
    for member in interface.members() {
        let Member::Method(method) = member else {
            return Err(GenerationError::NotAMethod {
                interface: qualified,
                member: member.name().to_owned(),
            });
        };

        if let Some(returns) = method.return_type() {
            return Err(GenerationError::NonVoidMethod {
                interface: qualified,
                method: method.name().to_owned(),
                returns: returns.to_owned(),
            });
        }

        methods.push(DeclaredMethod {
            declaring: interface.id(),
            interface: qualified.clone(),
            index,
            method: method.clone(),
        });

        index += 1;
    }

    Ok(())
}

/**
Plan the payload slots for a method.

Arguments without rules keep their position. Arguments with one rule are converted in place.
Arguments with several rules are dropped, and each rule's output is appended after the remaining
arguments.
Additional parameters come last.
*/
fn pipeline(
    method: &MethodDescriptor,
    configuration: &FinalizedConfiguration,
) -> Vec<ParameterDescriptor> {
    let mut params = Vec::with_capacity(method.params().len() + configuration.parameters().len());
    let mut expanded = Vec::new();

    for (position, param) in method.params().iter().enumerate() {
        let declared = *param.ty();
        let origin = Origin::Argument(position);

        match configuration.rules(&declared) {
            [] => params.push(ParameterDescriptor::new(
                declared,
                declared,
                origin,
                None,
                param.name_shared().clone(),
            )),
            [rule] => params.push(ParameterDescriptor::new(
                declared,
                *rule.output(),
                origin,
                Some(rule.slot()),
                rule.name_shared().unwrap_or(param.name_shared()).clone(),
            )),
            rules => expanded.extend(rules.iter().map(|rule| {
                ParameterDescriptor::new(
                    declared,
                    *rule.output(),
                    origin,
                    Some(rule.slot()),
                    rule.name_shared().unwrap_or(param.name_shared()).clone(),
                )
            })),
        }
    }

    params.extend(expanded);

    params.extend(configuration.parameters().iter().map(|rule| {
        ParameterDescriptor::new(
            *rule.output(),
            *rule.output(),
            Origin::Parameter,
            Some(rule.slot()),
            rule.name_shared().cloned().unwrap_or_else(|| Arc::from("")),
        )
    }));

    params
}

/**
Strip the conventional leading `I` from an interface name, as in `ILog`.
*/
fn generated_name(name: &str) -> &str {
    match name.strip_prefix('I') {
        Some(rest) if rest.starts_with(|c: char| c.is_uppercase()) => rest,
        _ => name,
    }
}

fn provider_name(interface: &InterfaceDescriptor, short_name: &str) -> String {
    let mut name = interface
        .provider_name()
        .filter(|name| !name.is_empty())
        .unwrap_or(short_name)
        .to_owned();

    for arg in interface.type_args() {
        name.push('-');
        name.push_str(short_type_name(*arg));
    }

    name
}

/**
Derive a stable GUID for a provider from its name.

Names are compared case-insensitively, so they're uppercased first.
*/
pub fn provider_guid(name: &str) -> Uuid {
    Uuid::new_v5(&PROVIDER_NAMESPACE, name.to_uppercase().as_bytes())
}
