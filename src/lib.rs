/*!
Structured event sources generated from event interfaces.

An event interface is a trait where each method describes one event. `emit_source` generates an
implementation of that trait at runtime: calling a method checks whether anybody is listening for
the event, converts its arguments into payload values, and writes it to an [`EventSourceBase`].

```
use std::sync::{Arc, Mutex};

use emit_source::{runtime, Generator, Keywords, Level, Payload};

#[emit_source::event_interface(provider: "Shop-Orders")]
pub trait IOrders {
    #[event(id: 1, level: Warning, message: "order {id} was rejected")]
    fn rejected(&self, id: u64, reason: String);
}

let generator = Generator::default();
let orders = generator.get::<dyn IOrders>()?;

let written = Arc::new(Mutex::new(Vec::new()));
let captured = written.clone();
orders.enable(
    runtime::from_fn(move |evt| captured.lock().unwrap().push(evt.payload().to_vec())),
    Level::Verbose,
    Keywords::NONE,
);

orders.rejected(42, String::from("out of stock"));

assert_eq!(
    vec![vec![Payload::U64(42), Payload::from("out of stock")]],
    *written.lock().unwrap()
);
# Ok::<(), emit_source::GenerationError>(())
```

Parameters that can't be written natively are handled by a [`Configuration`], which can map them
into other values or expand them into several payload values, and by a fallback converter that
formats them as text.
*/

extern crate self as emit_source;

pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod interface;
mod keywords;
mod level;
pub mod runtime;
mod setup;
pub mod source;
pub mod validity;
mod value;

#[doc(inline)]
pub use self::{
    config::{Configuration, FinalizedConfiguration, TypeMapping},
    error::{CallTimeError, ConfigurationError, Error, GenerationError},
    generator::Generator,
    interface::{Disposable, EventAttributes, EventInterface, InterfaceDescriptor},
    keywords::{Keywords, Opcode},
    level::{Level, ParseLevelError},
    runtime::{EventSourceBase, EventWritten, Listener},
    setup::Setup,
    source::EventSource,
    validity::{
        is_natively_loggable, validate_mapping_output_type, Argument, TypeDescriptor, Unsupported,
    },
    value::{Payload, ToValue, Value},
};

/**
Define an event interface.

The attribute goes on a trait. Each method of the trait is an event:

- methods take `&self` and return nothing.
- an optional `#[event(..)]` attribute sets the event's `id`, `level`, `keywords`, `opcode`,
  `task`, `version`, and `message`.
- every argument type implements [`Argument`].

Supertraits that are event interfaces become base interfaces, and their events are part of this one.
An optional `provider: "Name"` argument sets the provider name.
*/
pub use emit_source_macros::event_interface;

#[doc(hidden)]
pub mod __private {
    pub use core::any::{Any, TypeId};

    pub use crate::{
        interface::{EventAttributes, EventInterface, InterfaceDescriptor},
        keywords::{Keywords, Opcode},
        level::Level,
        source::EventSource,
    };
}
