/*!
The [`Payload`] and [`Value`] types.

A [`Payload`] is an owned, natively loggable event value. It's what the write primitive receives for
each slot of an event. A [`Value`] is a borrowed, structured view over some value that listeners
can format or serialize without knowing its concrete type.
*/

use core::fmt;
use std::time::SystemTime;

use uuid::Uuid;

#[derive(Clone)]
pub struct Value<'v>(value_bag::ValueBag<'v>);

impl<'v> Value<'v> {
    pub fn capture_display(value: &'v (impl fmt::Display + 'static)) -> Self {
        Value(value_bag::ValueBag::capture_display(value))
    }

    pub fn by_ref<'b>(&'b self) -> Value<'b> {
        Value(self.0.by_ref())
    }

    pub fn to_borrowed_str(&self) -> Option<&'v str> {
        self.0.to_borrowed_str()
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.0.to_f64()
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    pub fn to_bool(&self) -> Option<bool> {
        self.0.to_bool()
    }
}

impl<'v> fmt::Debug for Value<'v> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<'v> fmt::Display for Value<'v> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(feature = "sval")]
impl<'v> sval::Value for Value<'v> {
    fn stream<'sval, S: sval::Stream<'sval> + ?Sized>(&'sval self, stream: &mut S) -> sval::Result {
        self.0.stream(stream)
    }
}

#[cfg(feature = "serde")]
impl<'v> serde::Serialize for Value<'v> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl<'a, T: ToValue + ?Sized> ToValue for &'a T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<'v> ToValue for Value<'v> {
    fn to_value(&self) -> Value {
        self.by_ref()
    }
}

/**
A natively loggable value, ready to be handed to the write primitive.

Enum values are carried by their unsigned numeric representation, so there's no enum variant here.
*/
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Char(char),
    F32(f32),
    F64(f64),
    Str(String),
    Timestamp(SystemTime),
    Guid(Uuid),
    IntPtr(isize),
    UIntPtr(usize),
    Bytes(Vec<u8>),
}

impl Payload {
    /**
    Empty text.

    The write primitive never receives null text; absent text is written as this value instead.
    */
    pub fn empty_str() -> Self {
        Payload::Str(String::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /**
    The name of this value's payload kind, as it appears in event metadata.
    */
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Bool(_) => "bool",
            Payload::U8(_) => "u8",
            Payload::I8(_) => "i8",
            Payload::U16(_) => "u16",
            Payload::I16(_) => "i16",
            Payload::U32(_) => "u32",
            Payload::I32(_) => "i32",
            Payload::U64(_) => "u64",
            Payload::I64(_) => "i64",
            Payload::Char(_) => "char",
            Payload::F32(_) => "f32",
            Payload::F64(_) => "f64",
            Payload::Str(_) => "string",
            Payload::Timestamp(_) => "timestamp",
            Payload::Guid(_) => "guid",
            Payload::IntPtr(_) => "isize",
            Payload::UIntPtr(_) => "usize",
            Payload::Bytes(_) => "bytes",
        }
    }
}

impl ToValue for Payload {
    fn to_value(&self) -> Value {
        use value_bag::ValueBag;

        Value(match self {
            Payload::Bool(v) => ValueBag::from(*v),
            Payload::U8(v) => ValueBag::from(*v),
            Payload::I8(v) => ValueBag::from(*v),
            Payload::U16(v) => ValueBag::from(*v),
            Payload::I16(v) => ValueBag::from(*v),
            Payload::U32(v) => ValueBag::from(*v),
            Payload::I32(v) => ValueBag::from(*v),
            Payload::U64(v) => ValueBag::from(*v),
            Payload::I64(v) => ValueBag::from(*v),
            Payload::Char(v) => ValueBag::from(*v),
            Payload::F32(v) => ValueBag::from(f64::from(*v)),
            Payload::F64(v) => ValueBag::from(*v),
            Payload::Str(v) => ValueBag::from(v.as_str()),
            Payload::Timestamp(v) => ValueBag::capture_debug(v),
            Payload::Guid(v) => ValueBag::capture_display(v),
            Payload::IntPtr(v) => ValueBag::from(*v),
            Payload::UIntPtr(v) => ValueBag::from(*v),
            Payload::Bytes(v) => ValueBag::capture_debug(v),
        })
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_value(), f)
    }
}

macro_rules! impl_from_payload {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Payload::$variant(value)
                }
            }
        )*
    };
}

impl_from_payload![
    bool => Bool,
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    char => Char,
    f32 => F32,
    f64 => F64,
    String => Str,
    SystemTime => Timestamp,
    Uuid => Guid,
    isize => IntPtr,
    usize => UIntPtr,
    Vec<u8> => Bytes,
];

impl<'a> From<&'a str> for Payload {
    fn from(value: &'a str) -> Self {
        Payload::Str(value.to_owned())
    }
}
