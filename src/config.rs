/*!
The [`Configuration`] type.

A configuration describes how event parameters are converted before they're written:

- per-type mapping rules, built with [`TypeMapping`], that replace or expand parameters of a given
  type.
- additional parameters that are appended to every event.

Configurations are values. Every method that changes one returns a new configuration and leaves the
original untouched, so a base configuration can be shared and specialized freely.

Before a configuration is used to generate an event source it's
[finalized](Configuration::finalize). Finalizing assigns every conversion function a flat slot
number: first the mapping rules, in the order their types were registered, then the additional
parameters. Slots belong to one finalized configuration, so a merged configuration has to be
finalized again.
*/

use core::{
    any::{type_name, Any, TypeId},
    fmt,
    marker::PhantomData,
};
use std::{collections::HashMap, sync::Arc};

use crate::{
    error::ConfigurationError,
    validity::{validate_mapping_output_type, Argument, TypeDescriptor},
};

/**
A type-erased conversion function.

The function receives its input (ignored for additional parameters) and passes its output to the
given continuation, so outputs never need to be boxed. It returns `false` if the input has an
unexpected type.
*/
pub(crate) type ConvertFn = dyn Fn(&dyn Any, &mut dyn FnMut(&dyn Any)) -> bool + Send + Sync;

#[derive(Clone)]
struct NamedFn {
    func: Arc<ConvertFn>,
    name: Option<Arc<str>>,
    output: TypeDescriptor,
}

impl NamedFn {
    fn mapping<T: Argument, U: Argument>(
        name: Option<Arc<str>>,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
    ) -> Self {
        NamedFn {
            func: Arc::new(move |input: &dyn Any, output: &mut dyn FnMut(&dyn Any)| {
                match input.downcast_ref::<T>() {
                    Some(input) => {
                        output(&f(input));
                        true
                    }
                    None => false,
                }
            }),
            name,
            output: TypeDescriptor::of::<U>(),
        }
    }

    fn parameter<U: Argument>(name: Arc<str>, f: impl Fn() -> U + Send + Sync + 'static) -> Self {
        NamedFn {
            func: Arc::new(move |_: &dyn Any, output: &mut dyn FnMut(&dyn Any)| {
                output(&f());
                true
            }),
            name: Some(name),
            output: TypeDescriptor::of::<U>(),
        }
    }
}

impl fmt::Debug for NamedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFn")
            .field("name", &self.name)
            .field("output", &self.output)
            .finish()
    }
}

/**
The mapping rules for parameters of type `T`.

A type with a single rule has its parameters replaced in place. A type with multiple rules has its
parameters removed, and each rule's output is appended to the end of the event instead. Multiple
rules must all have distinct, non-empty names.
*/
pub struct TypeMapping<T> {
    rules: Vec<NamedFn>,
    _marker: PhantomData<fn(&T)>,
}

impl<T> Clone for TypeMapping<T> {
    fn clone(&self) -> Self {
        TypeMapping {
            rules: self.rules.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Argument> Default for TypeMapping<T> {
    fn default() -> Self {
        TypeMapping::new()
    }
}

impl<T: Argument> TypeMapping<T> {
    pub fn new() -> Self {
        TypeMapping {
            rules: Vec::new(),
            _marker: PhantomData,
        }
    }

    /**
    Convert values of `T` using `f`.
    */
    pub fn map<U: Argument>(
        self,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError> {
        self.push(None, f)
    }

    /**
    Convert values of `T` using `f`, writing the result under `name`.
    */
    pub fn map_named<U: Argument>(
        self,
        name: impl Into<String>,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();

        self.push(Some(name).filter(|name| !name.is_empty()), f)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn push<U: Argument>(
        mut self,
        name: Option<String>,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError> {
        validate_mapping_output_type(&TypeDescriptor::of::<U>())?;

        if !self.rules.is_empty() {
            let distinct = match name {
                Some(ref name) => self
                    .rules
                    .iter()
                    .all(|rule| matches!(rule.name, Some(ref existing) if **existing != **name)),
                None => false,
            };

            if !distinct {
                return Err(ConfigurationError::UnnamedMultipleMapping {
                    ty: type_name::<T>().to_owned(),
                });
            }
        }

        self.rules.push(NamedFn::mapping(name.map(Arc::from), f));

        Ok(self)
    }
}

#[derive(Clone)]
struct Mapping {
    ty: TypeDescriptor,
    rules: Arc<[NamedFn]>,
}

/**
Mapping rules and additional parameters for event sources.
*/
#[derive(Clone, Default)]
pub struct Configuration {
    // Ordered by the first registration of each type
    mappings: Vec<Mapping>,
    parameters: Vec<NamedFn>,
}

impl Configuration {
    pub fn empty() -> Self {
        Configuration::default()
    }

    /**
    Set the mapping rules for parameters of type `T`.

    Any rules already registered for `T` are replaced.

    ```
    # fn main() -> Result<(), emit_source::ConfigurationError> {
    #[derive(Debug)]
    struct Order {
        id: u64,
        total: f64,
    }

    impl emit_source::Argument for Order {}

    let config = emit_source::Configuration::empty()
        .with_mapping::<Order>(|m| m.map_named("id", |o| o.id)?.map_named("total", |o| o.total))?;
    # Ok(())
    # }
    ```
    */
    pub fn with_mapping<T: Argument>(
        &self,
        build: impl FnOnce(TypeMapping<T>) -> Result<TypeMapping<T>, ConfigurationError>,
    ) -> Result<Self, ConfigurationError> {
        let mapping = build(TypeMapping::new())?;

        let mut config = self.clone();
        config.set_mapping(Mapping {
            ty: TypeDescriptor::of::<T>(),
            rules: mapping.rules.into(),
        });

        Ok(config)
    }

    /**
    Append a parameter to every event, producing its value with `f` each time an event is written.
    */
    pub fn with_additional_parameter<U: Argument>(
        &self,
        f: impl Fn() -> U + Send + Sync + 'static,
        name: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigurationError::EmptyParameterName);
        }

        let mut config = self.clone();
        config.parameters.push(NamedFn::parameter(name.into(), f));

        Ok(config)
    }

    /**
    Combine this configuration with `other`.

    Mapping rules from `other` replace the rules for the same type in `self`. Additional parameters
    from `other` are appended after the ones in `self`.
    */
    pub fn merge(&self, other: &Configuration) -> Self {
        let mut config = self.clone();

        for mapping in &other.mappings {
            config.set_mapping(mapping.clone());
        }

        config.parameters.extend(other.parameters.iter().cloned());

        config
    }

    /**
    Assign slots to every conversion function.
    */
    pub fn finalize(&self) -> FinalizedConfiguration {
        let mut functions = Vec::new();
        let mut slot = |f: &NamedFn| {
            let index = functions.len();
            functions.push(f.func.clone());

            Rule {
                slot: index,
                name: f.name.clone(),
                output: f.output,
            }
        };

        let mut mappings = HashMap::with_capacity(self.mappings.len());
        for mapping in &self.mappings {
            let rules = mapping.rules.iter().map(&mut slot).collect::<Arc<[_]>>();

            mappings.insert(mapping.ty.id(), rules);
        }

        let parameters = self.parameters.iter().map(&mut slot).collect::<Arc<[_]>>();

        FinalizedConfiguration {
            source: self.clone(),
            mappings: Arc::new(mappings),
            parameters,
            functions: Functions(functions.into()),
        }
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    fn set_mapping(&mut self, mapping: Mapping) {
        match self
            .mappings
            .iter_mut()
            .find(|existing| existing.ty.id() == mapping.ty.id())
        {
            Some(existing) => *existing = mapping,
            None => self.mappings.push(mapping),
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Mappings<'a>(&'a [Mapping]);

        impl<'a> fmt::Debug for Mappings<'a> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_map()
                    .entries(self.0.iter().map(|m| (m.ty.name(), &*m.rules)))
                    .finish()
            }
        }

        f.debug_struct("Configuration")
            .field("mappings", &Mappings(&self.mappings))
            .field("parameters", &self.parameters)
            .finish()
    }
}

/**
A conversion function's place in a [`FinalizedConfiguration`].
*/
#[derive(Debug, Clone)]
pub struct Rule {
    slot: usize,
    name: Option<Arc<str>>,
    output: TypeDescriptor,
}

impl Rule {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn name_shared(&self) -> Option<&Arc<str>> {
        self.name.as_ref()
    }

    pub fn output(&self) -> &TypeDescriptor {
        &self.output
    }
}

/**
The flat list of conversion functions in a finalized configuration, indexed by slot.
*/
#[derive(Clone)]
pub struct Functions(Arc<[Arc<ConvertFn>]>);

impl Functions {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn call(
        &self,
        slot: usize,
        input: &dyn Any,
        output: &mut dyn FnMut(&dyn Any),
    ) -> bool {
        match self.0.get(slot) {
            Some(f) => f(input, output),
            None => false,
        }
    }
}

impl fmt::Debug for Functions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Functions").field("len", &self.len()).finish()
    }
}

/**
A configuration with slots assigned to its conversion functions.
*/
#[derive(Clone)]
pub struct FinalizedConfiguration {
    source: Configuration,
    mappings: Arc<HashMap<TypeId, Arc<[Rule]>>>,
    parameters: Arc<[Rule]>,
    functions: Functions,
}

impl Default for FinalizedConfiguration {
    fn default() -> Self {
        Configuration::empty().finalize()
    }
}

impl FinalizedConfiguration {
    /**
    The mapping rules for parameters of the given type, in registration order.
    */
    pub fn rules(&self, ty: &TypeDescriptor) -> &[Rule] {
        self.mappings.get(&ty.id()).map(|rules| &**rules).unwrap_or(&[])
    }

    pub fn parameters(&self) -> &[Rule] {
        &self.parameters
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    /**
    The configuration these slots were assigned from.
    */
    pub fn configuration(&self) -> &Configuration {
        &self.source
    }

    /**
    Merge `other` into the source configuration and finalize the result.
    */
    pub fn merge(&self, other: &Configuration) -> FinalizedConfiguration {
        self.source.merge(other).finalize()
    }
}

impl fmt::Debug for FinalizedConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizedConfiguration")
            .field("mappings", &self.mappings)
            .field("parameters", &self.parameters)
            .field("functions", &self.functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CustomData;

    impl Argument for CustomData {}

    fn call(config: &FinalizedConfiguration, slot: usize, input: &dyn Any) -> Option<i32> {
        let mut out = None;
        config.functions().call(slot, input, &mut |v| {
            out = v.downcast_ref::<i32>().copied();
        });

        out
    }

    #[test]
    fn double_unnamed_mapping_fails() {
        let err = TypeMapping::<CustomData>::new()
            .map(|_| 1)
            .and_then(|m| m.map(|_| 2))
            .err()
            .unwrap();

        assert!(matches!(err, ConfigurationError::UnnamedMultipleMapping { .. }));
    }

    #[test]
    fn double_mapping_needs_both_names() {
        assert!(TypeMapping::<CustomData>::new()
            .map(|_| 1)
            .and_then(|m| m.map_named("b", |_| 2))
            .is_err());

        assert!(TypeMapping::<CustomData>::new()
            .map_named("a", |_| 1)
            .and_then(|m| m.map(|_| 2))
            .is_err());

        assert!(TypeMapping::<CustomData>::new()
            .map_named("a", |_| 1)
            .and_then(|m| m.map_named("", |_| 2))
            .is_err());

        assert!(TypeMapping::<CustomData>::new()
            .map_named("a", |_| 1)
            .and_then(|m| m.map_named("a", |_| 2))
            .is_err());

        let mapping = TypeMapping::<CustomData>::new()
            .map_named("a", |_| 1)
            .and_then(|m| m.map_named("b", |_| 2))
            .unwrap();

        assert_eq!(2, mapping.len());
    }

    #[test]
    fn double_mapping_fails_in_configuration() {
        let err = Configuration::empty()
            .with_mapping::<CustomData>(|m| m.map(|_| 1)?.map(|_| 2))
            .err()
            .unwrap();

        assert!(matches!(err, ConfigurationError::UnnamedMultipleMapping { .. }));
    }

    #[test]
    fn mapping_output_must_be_native() {
        #[derive(Debug)]
        struct Other;

        impl Argument for Other {}

        let err = TypeMapping::<CustomData>::new()
            .map(|_| Other)
            .err()
            .unwrap();

        assert!(matches!(err, ConfigurationError::UnsupportedMappingOutput { .. }));
    }

    #[test]
    fn additional_parameter_name_required() {
        let err = Configuration::empty()
            .with_additional_parameter(|| 1, "")
            .unwrap_err();

        assert_eq!(ConfigurationError::EmptyParameterName, err);
    }

    #[test]
    fn mutators_leave_receiver_untouched() {
        let base = Configuration::empty();
        let with_param = base.with_additional_parameter(|| 1, "x").unwrap();
        let with_mapping = with_param
            .with_mapping::<CustomData>(|m| m.map(|_| 1))
            .unwrap();

        assert_eq!(0, base.parameter_count());
        assert_eq!(1, with_param.parameter_count());
        assert_eq!(0, with_param.mapping_count());
        assert_eq!(1, with_mapping.mapping_count());
    }

    #[test]
    fn finalize_assigns_mapping_slots_before_parameters() {
        let config = Configuration::empty()
            .with_additional_parameter(|| 10, "x")
            .unwrap()
            .with_mapping::<CustomData>(|m| m.map_named("a", |_| 1)?.map_named("b", |_| 2))
            .unwrap()
            .with_mapping::<u64>(|m| m.map(|v| *v as i32))
            .unwrap()
            .finalize();

        let custom = config.rules(&TypeDescriptor::of::<CustomData>());
        assert_eq!(
            vec![(0, Some("a")), (1, Some("b"))],
            custom.iter().map(|r| (r.slot(), r.name())).collect::<Vec<_>>()
        );

        let int = config.rules(&TypeDescriptor::of::<u64>());
        assert_eq!(2, int[0].slot());
        assert_eq!(None, int[0].name());

        assert_eq!(3, config.parameters()[0].slot());
        assert_eq!(4, config.functions().len());

        assert_eq!(Some(1), call(&config, 0, &CustomData));
        assert_eq!(Some(2), call(&config, 1, &CustomData));
        assert_eq!(Some(7), call(&config, 2, &7u64));
        assert_eq!(Some(10), call(&config, 3, &()));
    }

    #[test]
    fn merge_replaces_mappings_and_appends_parameters() {
        let base = Configuration::empty()
            .with_mapping::<CustomData>(|m| m.map(|_| 1))
            .unwrap()
            .with_mapping::<u64>(|m| m.map(|_| 5))
            .unwrap()
            .with_additional_parameter(|| 10, "x")
            .unwrap();

        let over = Configuration::empty()
            .with_mapping::<CustomData>(|m| m.map(|_| 2))
            .unwrap()
            .with_additional_parameter(|| 20, "y")
            .unwrap();

        let merged = base.merge(&over).finalize();

        // The override keeps the base's position for the replaced type
        let custom = merged.rules(&TypeDescriptor::of::<CustomData>());
        assert_eq!(1, custom.len());
        assert_eq!(0, custom[0].slot());
        assert_eq!(Some(2), call(&merged, 0, &CustomData));

        assert_eq!(
            vec![Some("x"), Some("y")],
            merged.parameters().iter().map(|r| r.name()).collect::<Vec<_>>()
        );
        assert_eq!(Some(10), call(&merged, 2, &()));
        assert_eq!(Some(20), call(&merged, 3, &()));

        // The base is unchanged
        let base = base.finalize();
        assert_eq!(Some(1), call(&base, 0, &CustomData));
        assert_eq!(1, base.parameters().len());
    }

    #[test]
    fn mismatched_input_is_reported() {
        let config = Configuration::empty()
            .with_mapping::<CustomData>(|m| m.map(|_| 1))
            .unwrap()
            .finalize();

        let called = config.functions().call(0, &1u8, &mut |_| {});

        assert!(!called);
        assert!(!config.functions().call(9, &CustomData, &mut |_| {}));
    }
}
