use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;

use log::trace;

use crate::descriptor::SetTarget;
use crate::error::{AccessError, BindError, PathSegment, ValueError};
use crate::hash::{HashMap, HashSet};
use crate::info::{CreateFn, CreatorArgs, EntriesFn, EntrySetFn, GetFn, GetMutFn, HandleFn};
use crate::info::{Inclusion, IterFn, IterMutFn, SetFn, TypeKey};
use crate::token::{Token, TokenReader, TokenWriter, unexpected};

use super::{DecodeContext, Decoder, EncodeContext, Encoder};

// -----------------------------------------------------------------------------
// RecordEncoder

pub(crate) struct PropertyWriter {
    pub name: String,
    pub get: GetFn,
    pub encoder: Arc<dyn Encoder>,
    pub inclusion: Inclusion,
}

pub(crate) struct AnyWriter {
    pub get: GetFn,
    pub entries: EntriesFn,
    pub value: Arc<dyn Encoder>,
}

/// Writes a record as an object of its properties.
pub struct RecordEncoder {
    pub(crate) key: TypeKey,
    pub(crate) properties: Vec<PropertyWriter>,
    pub(crate) any_getter: Option<AnyWriter>,
}

impl RecordEncoder {
    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// The names of the written properties, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    /// Writes the properties of `value` without the enclosing object tokens.
    pub fn write_fields(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        ctx.nested(value, self.key.path(), |ctx| {
            for property in &self.properties {
                let read = (property.get)(value).ok_or_else(|| self.mismatch())?;
                let field = read.as_any();
                let skip = match property.inclusion {
                    Inclusion::Always => false,
                    Inclusion::NonNull => property.encoder.is_absent(field),
                    Inclusion::NonEmpty => property.encoder.is_empty(field),
                };
                if skip {
                    continue;
                }
                writer.field_name(&property.name)?;
                property
                    .encoder
                    .encode(field, writer, ctx)
                    .map_err(|e| e.with_segment(PathSegment::Property(property.name.clone())))?;
            }

            if let Some(any) = &self.any_getter {
                let read = (any.get)(value).ok_or_else(|| self.mismatch())?;
                let entries = (any.entries)(read.as_any()).ok_or_else(|| self.mismatch())?;
                for (name, item) in entries {
                    // Declared properties own their names.
                    if self.properties.iter().any(|p| p.name == name) {
                        trace!("skipping extra entry `{name}` of `{}`", self.key.path());
                        continue;
                    }
                    writer.field_name(name)?;
                    any.value
                        .encode(item, writer, ctx)
                        .map_err(|e| e.with_segment(PathSegment::Property(String::from(name))))?;
                }
            }
            Ok(())
        })
    }

    fn mismatch(&self) -> BindError {
        AccessError::Downcast {
            expected: self.key.path(),
        }
        .into()
    }
}

impl Encoder for RecordEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        writer.start_object()?;
        self.write_fields(value, writer, ctx)?;
        writer.end_object()
    }

    #[inline]
    fn as_record(&self) -> Option<&RecordEncoder> {
        Some(self)
    }
}

// -----------------------------------------------------------------------------
// RecordDecoder

pub(crate) struct PropertyReader {
    pub name: String,
    pub target: SetTarget,
    pub decoder: Arc<dyn Decoder>,
}

pub(crate) enum AnyReader {
    Entry {
        set: EntrySetFn,
        decoder: Arc<dyn Decoder>,
    },
    Map {
        get_mut: GetMutFn,
        insert: EntrySetFn,
        decoder: Arc<dyn Decoder>,
    },
}

impl AnyReader {
    fn decoder(&self) -> &Arc<dyn Decoder> {
        match self {
            AnyReader::Entry { decoder, .. } | AnyReader::Map { decoder, .. } => decoder,
        }
    }

    fn apply(
        &self,
        owner: &mut dyn Any,
        name: String,
        value: Box<dyn Any>,
    ) -> Result<(), AccessError> {
        match self {
            AnyReader::Entry { set, .. } => set(owner, name, value),
            AnyReader::Map { get_mut, insert, .. } => {
                let map = get_mut(owner).ok_or(AccessError::Custom(String::from(
                    "any-setter map is not reachable",
                )))?;
                insert(map, name, value)
            }
        }
    }
}

/// How the instance of a record is obtained.
pub(crate) enum Construct {
    /// Created empty before the properties are read.
    Default(CreateFn),
    /// Created from buffered properties once the object is read.
    ///
    /// `slots[i]` is the property bound to parameter `i`.
    Properties {
        invoke: CreateFn,
        slots: Vec<usize>,
    },
    /// Created from the whole value decoded as the single parameter.
    Delegating {
        invoke: CreateFn,
        decoder: Arc<dyn Decoder>,
    },
}

/// How a managed-reference property holds its children.
pub(crate) enum ChildAccess {
    Single,
    Many { iter: IterFn, iter_mut: IterMutFn },
}

/// Sets the back references of the children held by one property.
pub(crate) struct ManagedFixup {
    pub property: String,
    pub get: GetFn,
    pub get_mut: GetMutFn,
    pub children: ChildAccess,
    pub set_back: SetFn,
}

/// Reads a record from an object, or from the delegate value of a
/// delegating creator.
pub struct RecordDecoder {
    pub(crate) key: TypeKey,
    pub(crate) construct: Construct,
    pub(crate) properties: Vec<PropertyReader>,
    pub(crate) lookup: HashMap<String, usize>,
    pub(crate) any_setter: Option<AnyReader>,
    pub(crate) ignored: HashSet<String>,
    pub(crate) fail_on_unknown: bool,
    pub(crate) managed: Vec<ManagedFixup>,
    pub(crate) back_handle: Option<HandleFn>,
}

impl RecordDecoder {
    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    fn decode_object(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.token()? {
            Token::StartObject => {}
            other => return Err(unexpected("start of object", Some(other))),
        }

        let mut instance = match &self.construct {
            Construct::Default(invoke) => Some(invoke(&mut CreatorArgs::empty())?),
            _ => None,
        };
        let mut buffered: Vec<Option<Box<dyn Any>>> =
            (0..self.properties.len()).map(|_| None).collect();
        let mut extra: Vec<(String, Box<dyn Any>)> = Vec::new();

        loop {
            let name = match reader.next_token()? {
                Token::EndObject => break,
                Token::FieldName(name) => name.clone(),
                other => return Err(unexpected("a field name", Some(other))),
            };
            reader.advance()?;
            let at = |e: BindError| e.with_segment(PathSegment::Property(name.clone()));

            if let Some(&index) = self.lookup.get(&name) {
                let property = &self.properties[index];
                let value = property.decoder.decode(reader, ctx).map_err(at)?;
                match (&property.target, instance.as_mut()) {
                    (SetTarget::Setter(set), Some(owner)) => {
                        set(&mut **owner, value).map_err(|e| at(e.into()))?;
                    }
                    _ => buffered[index] = Some(value),
                }
            } else if self.ignored.contains(&name) {
                reader.skip_children()?;
            } else if let Some(any) = &self.any_setter {
                let value = any.decoder().decode(reader, ctx).map_err(at)?;
                match instance.as_mut() {
                    Some(owner) => any.apply(&mut **owner, name, value)?,
                    None => extra.push((name, value)),
                }
            } else if !self.fail_on_unknown {
                reader.skip_children()?;
            } else {
                let error = ValueError::UnknownProperty {
                    name: name.clone(),
                    ty: self.key.path(),
                };
                return Err(at(error.into()));
            }
        }

        let mut instance = match instance {
            Some(instance) => instance,
            None => self.create(&mut buffered)?,
        };

        for (index, value) in buffered.into_iter().enumerate() {
            let Some(value) = value else { continue };
            if let SetTarget::Setter(set) = &self.properties[index].target {
                let name = &self.properties[index].name;
                set(&mut *instance, value)
                    .map_err(|e| BindError::from(e).with_segment(PathSegment::Property(name.clone())))?;
            }
        }
        if let Some(any) = &self.any_setter {
            for (name, value) in extra {
                any.apply(&mut *instance, name, value)?;
            }
        }

        Ok(instance)
    }

    /// Invokes a properties creator with the buffered arguments.
    ///
    /// Missing arguments fall back to the absent value of their decoder.
    fn create(&self, buffered: &mut [Option<Box<dyn Any>>]) -> Result<Box<dyn Any>, BindError> {
        let Construct::Properties { invoke, slots } = &self.construct else {
            return Err(AccessError::Custom(String::from("record has no properties creator")).into());
        };

        let args = slots
            .iter()
            .map(|&index| {
                buffered[index]
                    .take()
                    .or_else(|| self.properties[index].decoder.absent_value())
            })
            .collect();

        invoke(&mut CreatorArgs::new(args)).map_err(|error| match error {
            AccessError::MissingArgument { index } => ValueError::MissingCreatorProperty {
                name: slots
                    .get(index)
                    .map(|&slot| self.properties[slot].name.clone())
                    .unwrap_or_default(),
                ty: self.key.path(),
            }
            .into(),
            other => other.into(),
        })
    }

    /// Stores the owner's handle into the back-reference property of every
    /// child of its managed references.
    fn fix_managed(&self, owner: &mut dyn Any) -> Result<(), BindError> {
        let Some(handle) = &self.back_handle else {
            return Ok(());
        };

        for fixup in &self.managed {
            let count = match &fixup.children {
                ChildAccess::Single => 1,
                ChildAccess::Many { iter, .. } => {
                    let Some(read) = (fixup.get)(&*owner) else { continue };
                    iter(read.as_any()).map_or(0, |children| children.len())
                }
            };
            let handles = (0..count)
                .map(|_| handle(&*owner))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| AccessError::Downcast {
                    expected: self.key.path(),
                })?;

            let Some(field) = (fixup.get_mut)(&mut *owner) else { continue };
            let at = |e: AccessError| {
                BindError::from(e).with_segment(PathSegment::Property(fixup.property.clone()))
            };
            match &fixup.children {
                ChildAccess::Single => {
                    for handle in handles {
                        (fixup.set_back)(&mut *field, handle).map_err(at)?;
                    }
                }
                ChildAccess::Many { iter_mut, .. } => {
                    let children = iter_mut(field).unwrap_or_default();
                    for (child, handle) in children.into_iter().zip(handles) {
                        (fixup.set_back)(child, handle).map_err(at)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Decoder for RecordDecoder {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        let mut instance = ctx.nested(|ctx| match &self.construct {
            Construct::Delegating { invoke, decoder } => {
                let delegate = decoder.decode(reader, ctx)?;
                Ok(invoke(&mut CreatorArgs::new(alloc::vec![Some(delegate)]))?)
            }
            _ => self.decode_object(reader, ctx),
        })?;
        if !self.managed.is_empty() {
            self.fix_managed(&mut *instance)?;
        }
        Ok(instance)
    }
}
