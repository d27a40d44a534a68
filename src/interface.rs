/*!
Event interfaces.

An event interface is a trait whose methods each describe one event. Implementations are never
written by hand; instead the trait is described by an [`InterfaceDescriptor`], and an event source
satisfying the trait is generated from it at runtime.

The `#[event_interface]` macro derives descriptors from trait definitions. Descriptors can also be
built directly:

```
use emit_source::{EventAttributes, EventInterface, InterfaceDescriptor, Level};

pub trait Requests {}

impl EventInterface for dyn Requests {
    fn describe() -> InterfaceDescriptor {
        InterfaceDescriptor::builder::<dyn Requests>("Requests", module_path!())
            .method("received", |m| {
                m.event(EventAttributes::new().id(1).level(Level::Verbose))
                    .param::<String>("path")
                    .param::<u16>("status")
            })
            .build()
    }
}
```
*/

use core::{
    any::{type_name, Any, TypeId},
    fmt,
};
use std::sync::Arc;

use crate::{
    keywords::{Keywords, Opcode},
    level::Level,
    source::{EventSource, Parts},
    validity::{Argument, TypeDescriptor},
};

/**
A trait that can be described as an event interface.

This is implemented for trait objects, like `dyn MyEvents`, so the trait's `TypeId` identifies the
interface.
*/
pub trait EventInterface: Any {
    fn describe() -> InterfaceDescriptor;
}

/**
The universal disposal capability.

Disposal is never an event. Its methods are excluded from every generated event source.
*/
pub trait Disposable {
    fn dispose(&self);
}

impl EventInterface for dyn Disposable {
    fn describe() -> InterfaceDescriptor {
        InterfaceDescriptor::builder::<dyn Disposable>("Disposable", module_path!())
            .method("dispose", |m| m)
            .build()
    }
}

/**
Metadata attached to an event method.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct EventAttributes {
    pub id: Option<u32>,
    pub level: Level,
    pub keywords: Keywords,
    pub opcode: Opcode,
    pub task: u16,
    pub version: u8,
    pub message: Option<String>,
}

impl Default for EventAttributes {
    fn default() -> Self {
        EventAttributes::new()
    }
}

impl EventAttributes {
    pub fn new() -> Self {
        EventAttributes {
            id: None,
            level: Level::Informational,
            keywords: Keywords::NONE,
            opcode: Opcode::INFO,
            task: 0,
            version: 0,
            message: None,
        }
    }

    pub fn id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn keywords(mut self, keywords: impl Into<Keywords>) -> Self {
        self.keywords = keywords.into();
        self
    }

    pub fn opcode(mut self, opcode: impl Into<Opcode>) -> Self {
        self.opcode = opcode.into();
        self
    }

    pub fn task(mut self, task: u16) -> Self {
        self.task = task;
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/**
A declared method parameter.
*/
#[derive(Debug, Clone)]
pub struct ParameterDecl {
    name: Arc<str>,
    ty: TypeDescriptor,
}

impl ParameterDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_shared(&self) -> &Arc<str> {
        &self.name
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }
}

/**
A declared interface method.
*/
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    name: String,
    attributes: EventAttributes,
    params: Vec<ParameterDecl>,
    returns: Option<&'static str>,
}

impl MethodDescriptor {
    fn new(name: impl Into<String>) -> Self {
        MethodDescriptor {
            name: name.into(),
            attributes: EventAttributes::new(),
            params: Vec::new(),
            returns: None,
        }
    }

    pub fn event(mut self, attributes: EventAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn param<T: Argument>(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParameterDecl {
            name: name.into().into(),
            ty: TypeDescriptor::of::<T>(),
        });
        self
    }

    /**
    Declare a return type.

    Event methods can't return values, so generating an event source for this method will fail.
    */
    pub fn returns<T: ?Sized>(mut self) -> Self {
        self.returns = Some(type_name::<T>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &EventAttributes {
        &self.attributes
    }

    pub fn params(&self) -> &[ParameterDecl] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&'static str> {
        self.returns
    }
}

/**
A member declared by an interface.
*/
#[derive(Debug, Clone)]
pub enum Member {
    Method(MethodDescriptor),
    Other { name: String },
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Method(method) => method.name(),
            Member::Other { name } => name,
        }
    }
}

/**
A reference to a base interface.
*/
#[derive(Clone, Copy)]
pub struct BaseInterface {
    id: TypeId,
    describe: fn() -> InterfaceDescriptor,
}

impl BaseInterface {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn describe(&self) -> InterfaceDescriptor {
        (self.describe)()
    }

    pub fn is_disposable(&self) -> bool {
        self.id == TypeId::of::<dyn Disposable>()
    }
}

impl fmt::Debug for BaseInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.id, f)
    }
}

/**
The shape of an event interface.
*/
#[derive(Clone)]
pub struct InterfaceDescriptor {
    id: TypeId,
    name: &'static str,
    module_path: &'static str,
    provider_name: Option<String>,
    type_args: Vec<&'static str>,
    bases: Vec<BaseInterface>,
    members: Vec<Member>,
    instantiate: fn(Parts) -> Arc<dyn Any + Send + Sync>,
}

impl InterfaceDescriptor {
    /**
    Begin describing the interface `I`.

    The `name` is the trait's own name, and `module_path` is the module it's declared in.
    */
    pub fn builder<I: EventInterface + ?Sized>(
        name: &'static str,
        module_path: &'static str,
    ) -> InterfaceBuilder {
        InterfaceBuilder {
            descriptor: InterfaceDescriptor {
                id: TypeId::of::<I>(),
                name,
                module_path,
                provider_name: None,
                type_args: Vec::new(),
                bases: Vec::new(),
                members: Vec::new(),
                instantiate: EventSource::<I>::instantiate,
            },
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider_name.as_deref()
    }

    pub fn type_args(&self) -> &[&'static str] {
        &self.type_args
    }

    pub fn bases(&self) -> &[BaseInterface] {
        &self.bases
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub(crate) fn instantiate(&self, parts: Parts) -> Arc<dyn Any + Send + Sync> {
        (self.instantiate)(parts)
    }
}

impl fmt::Debug for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDescriptor")
            .field("name", &self.name)
            .field("module_path", &self.module_path)
            .field("provider_name", &self.provider_name)
            .field("type_args", &self.type_args)
            .field("bases", &self.bases)
            .field("members", &self.members)
            .finish()
    }
}

pub struct InterfaceBuilder {
    descriptor: InterfaceDescriptor,
}

impl InterfaceBuilder {
    /**
    Use an explicit provider name instead of one derived from the interface name.
    */
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.provider_name = Some(name.into());
        self
    }

    /**
    Record a type argument of a generic interface.
    */
    pub fn type_arg<T: ?Sized>(mut self) -> Self {
        self.descriptor.type_args.push(type_name::<T>());
        self
    }

    /**
    Extend the interface `B`.

    Events declared by `B`, and its own bases, are part of this interface too.
    */
    pub fn extends<B: EventInterface + ?Sized>(mut self) -> Self {
        self.descriptor.bases.push(BaseInterface {
            id: TypeId::of::<B>(),
            describe: B::describe,
        });
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl FnOnce(MethodDescriptor) -> MethodDescriptor,
    ) -> Self {
        self.descriptor
            .members
            .push(Member::Method(method(MethodDescriptor::new(name))));
        self
    }

    /**
    Declare a member that isn't a method.

    Event interfaces can only declare methods, so generating an event source for this interface will
    fail.
    */
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.descriptor
            .members
            .push(Member::Other { name: name.into() });
        self
    }

    pub fn build(self) -> InterfaceDescriptor {
        self.descriptor
    }
}
