/*!
Which values can be written to an event as-is.

Every type that can appear as an event parameter, a conversion output, or an additional parameter
implements [`Argument`]. Its [`TypeDescriptor`] says whether the type is natively loggable, and if
it is, how to turn a value of it into a [`Payload`]. Everything else has to go through a mapping
rule or the fallback converter before it can be written.
*/

use core::{
    any::{type_name, Any, TypeId},
    fmt,
};
use std::time::SystemTime;

use uuid::Uuid;

use crate::{error::ConfigurationError, value::Payload};

pub(crate) type NativeFn = fn(&dyn Any) -> Option<Payload>;
type DebugFn = fn(&dyn Any, &mut fmt::Formatter<'_>) -> fmt::Result;
type IsNoneFn = fn(&dyn Any) -> bool;

/**
The runtime identity of a value type.
*/
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    native: Option<NativeFn>,
    debug: DebugFn,
    is_none: IsNoneFn,
}

impl TypeDescriptor {
    /**
    Describe an argument type, using its [`Argument::native_payload`] conversion if it has one.
    */
    pub fn argument<T: Argument>() -> Self {
        TypeDescriptor {
            native: T::native_payload().map(|_| cast_native::<T> as NativeFn),
            ..TypeDescriptor::unsupported::<T>()
        }
    }

    /**
    A type that isn't natively loggable.
    */
    pub fn unsupported<T: Argument>() -> Self {
        TypeDescriptor {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            native: None,
            debug: debug_any::<T>,
            is_none: |_| false,
        }
    }

    pub fn of<T: Argument>() -> Self {
        T::describe()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /**
    The type's name without its module path.
    */
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }

    pub(crate) fn to_payload(&self, value: &dyn Any) -> Option<Payload> {
        self.native.and_then(|native| native(value))
    }

    fn with_is_none(mut self, is_none: IsNoneFn) -> Self {
        self.is_none = is_none;
        self
    }

    fn with_debug(mut self, debug: DebugFn) -> Self {
        self.debug = debug;
        self
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("native", &self.is_native())
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/**
A type that can be passed to an event.

The default implementation describes a type that isn't natively loggable:

```
#[derive(Debug)]
struct Order {
    id: u64,
}

impl emit_source::Argument for Order {}
```
*/
pub trait Argument: Any + fmt::Debug {
    fn describe() -> TypeDescriptor
    where
        Self: Sized,
    {
        TypeDescriptor::argument::<Self>()
    }

    /**
    The conversion used to write values of this type as-is.

    Return `None` for types that aren't natively loggable.
    */
    fn native_payload() -> Option<fn(&Self) -> Payload>
    where
        Self: Sized,
    {
        None
    }
}

fn cast_native<T: Argument>(value: &dyn Any) -> Option<Payload> {
    let to_payload = T::native_payload()?;

    value.downcast_ref::<T>().map(to_payload)
}

fn debug_any<T: Argument>(value: &dyn Any, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => fmt::Debug::fmt(value, f),
        None => f.write_str(type_name::<T>()),
    }
}

macro_rules! impl_native_argument {
    ($($ty:ty => $to_payload:expr,)*) => {
        $(
            impl Argument for $ty {
                fn native_payload() -> Option<fn(&Self) -> Payload> {
                    fn to_payload(v: &$ty) -> Payload {
                        let to_payload: fn(&$ty) -> Payload = $to_payload;
                        to_payload(v)
                    }

                    Some(to_payload as fn(&Self) -> Payload)
                }
            }
        )*
    };
}

impl_native_argument![
    bool => |v| Payload::Bool(*v),
    u8 => |v| Payload::U8(*v),
    i8 => |v| Payload::I8(*v),
    u16 => |v| Payload::U16(*v),
    i16 => |v| Payload::I16(*v),
    u32 => |v| Payload::U32(*v),
    i32 => |v| Payload::I32(*v),
    u64 => |v| Payload::U64(*v),
    i64 => |v| Payload::I64(*v),
    char => |v| Payload::Char(*v),
    f32 => |v| Payload::F32(*v),
    f64 => |v| Payload::F64(*v),
    isize => |v| Payload::IntPtr(*v),
    usize => |v| Payload::UIntPtr(*v),
    String => |v| Payload::Str(v.clone()),
    &'static str => |v| Payload::Str((*v).to_owned()),
    SystemTime => |v| Payload::Timestamp(*v),
    Uuid => |v| Payload::Guid(*v),
    Vec<u8> => |v| Payload::Bytes(v.clone()),
];

/**
Nullable values.

Nullable text and byte sequences are natively loggable, with `None` written as an empty value.
Any other `Option<T>` is left to mapping rules or the fallback converter, which can check
[`Unsupported::is_none`].
*/
impl<T: Argument> Argument for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::argument::<Self>()
            .with_is_none(option_is_none::<T>)
            .with_debug(option_debug::<T>)
    }

    fn native_payload() -> Option<fn(&Self) -> Payload> {
        let id = TypeId::of::<T>();

        if id == TypeId::of::<String>() || id == TypeId::of::<&'static str>() {
            let to_payload: fn(&Self) -> Payload = |v: &Option<T>| {
                v.as_ref()
                    .and_then(|v| T::describe().to_payload(v as &dyn Any))
                    .unwrap_or_else(Payload::empty_str)
            };

            Some(to_payload)
        } else if id == TypeId::of::<Vec<u8>>() {
            let to_payload: fn(&Self) -> Payload = |v: &Option<T>| {
                v.as_ref()
                    .and_then(|v| T::describe().to_payload(v as &dyn Any))
                    .unwrap_or_else(|| Payload::Bytes(Vec::new()))
            };

            Some(to_payload)
        } else {
            None
        }
    }
}

fn option_is_none<T: Argument>(value: &dyn Any) -> bool {
    matches!(value.downcast_ref::<Option<T>>(), Some(None))
}

fn option_debug<T: Argument>(value: &dyn Any, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<Option<T>>() {
        Some(Some(value)) => fmt::Debug::fmt(value, f),
        Some(None) => Ok(()),
        None => f.write_str(type_name::<Option<T>>()),
    }
}

/**
Implement [`Argument`] for a fieldless enum, carrying its values as an unsigned integer.

```
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum DayOfWeek {
    Sunday,
    Monday,
}

emit_source::enum_argument!(DayOfWeek as u32);
```
*/
#[macro_export]
macro_rules! enum_argument {
    (@impl $ty:ty, $repr:ty, $variant:ident) => {
        impl $crate::Argument for $ty {
            fn native_payload() -> ::core::option::Option<fn(&Self) -> $crate::Payload> {
                fn to_payload(v: &$ty) -> $crate::Payload {
                    $crate::Payload::$variant(*v as $repr)
                }

                ::core::option::Option::Some(to_payload as fn(&Self) -> $crate::Payload)
            }
        }
    };
    ($ty:ty as u8) => {
        $crate::enum_argument!(@impl $ty, u8, U8);
    };
    ($ty:ty as u16) => {
        $crate::enum_argument!(@impl $ty, u16, U16);
    };
    ($ty:ty as u32) => {
        $crate::enum_argument!(@impl $ty, u32, U32);
    };
    ($ty:ty as u64) => {
        $crate::enum_argument!(@impl $ty, u64, U64);
    };
}

/**
A value that isn't natively loggable, as seen by a fallback converter.
*/
pub struct Unsupported<'a> {
    value: &'a dyn Any,
    ty: &'a TypeDescriptor,
}

impl<'a> Unsupported<'a> {
    pub(crate) fn new(value: &'a dyn Any, ty: &'a TypeDescriptor) -> Self {
        Unsupported { value, ty }
    }

    pub fn type_name(&self) -> &'static str {
        self.ty.name
    }

    /**
    Whether the value is an empty `Option`.
    */
    pub fn is_none(&self) -> bool {
        (self.ty.is_none)(self.value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        self.value.downcast_ref()
    }
}

impl<'a> fmt::Debug for Unsupported<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.ty.debug)(self.value, f)
    }
}

pub fn is_natively_loggable(ty: &TypeDescriptor) -> bool {
    ty.is_native()
}

/**
Check that a conversion function produces something that can be written.
*/
pub fn validate_mapping_output_type(ty: &TypeDescriptor) -> Result<(), ConfigurationError> {
    if is_natively_loggable(ty) {
        Ok(())
    } else {
        Err(ConfigurationError::UnsupportedMappingOutput {
            output: ty.name().to_owned(),
        })
    }
}

pub(crate) fn short_type_name(name: &'static str) -> &'static str {
    // Only strip the path before any generic arguments
    let end = name.find('<').unwrap_or(name.len());

    match name[..end].rfind("::") {
        Some(start) => &name[start + 2..],
        None => name,
    }
}
