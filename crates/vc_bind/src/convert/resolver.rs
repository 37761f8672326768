use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::debug;

use crate::descriptor::{AnySetter, CreatorKind, SetTarget};
use crate::error::{BindError, ReferenceChain, ReferenceLink, ResolveError};
use crate::hash::HashMap;
use crate::info::{ClassKind, TypeDecl, TypeKey};
use crate::introspect::AnnotatedType;
use crate::mapper::Mapper;
use crate::poly::{PolymorphicDecoder, PolymorphicEncoder, TypeInfoSpec, TypedEncoder};

use super::{AnyReader, AnyWriter, ChildAccess, Construct, ManagedFixup};
use super::{DecoderKey, Decoder, DynamicEncoder, Encoder, EncoderKey};
use super::{EnumConverter, ForwardDecoder, ForwardEncoder, RecordDecoder, RecordEncoder};
use super::{MapDecoder, MapEncoder, OptionalDecoder, OptionalEncoder, PointerDecoder};
use super::{PointerEncoder, PropertyReader, PropertyWriter, SequenceDecoder, SequenceEncoder};

/// Builds the converters of one cache miss.
///
/// Converters reached while building are resolved recursively. A type
/// reached again while its own converter is still being built gets a
/// forward placeholder, filled when that build completes. Nothing is
/// published to the mapper's caches until the outermost build succeeded.
pub(crate) struct Resolver<'m> {
    mapper: &'m Mapper,
    chain: Vec<ReferenceLink>,
    pending_encoders: HashMap<EncoderKey, Arc<ForwardEncoder>>,
    pending_decoders: HashMap<DecoderKey, Arc<ForwardDecoder>>,
    built_encoders: Vec<(EncoderKey, Arc<dyn Encoder>)>,
    built_decoders: Vec<(DecoderKey, Arc<dyn Decoder>)>,
}

impl<'m> Resolver<'m> {
    pub fn new(mapper: &'m Mapper) -> Self {
        Self {
            mapper,
            chain: Vec::new(),
            pending_encoders: HashMap::default(),
            pending_decoders: HashMap::default(),
            built_encoders: Vec::new(),
            built_decoders: Vec::new(),
        }
    }

    /// Publishes every converter built by this resolver.
    pub fn commit(self) {
        if !self.built_encoders.is_empty() || !self.built_decoders.is_empty() {
            debug!(
                "installing {} encoders and {} decoders",
                self.built_encoders.len(),
                self.built_decoders.len(),
            );
        }
        for (key, encoder) in self.built_encoders {
            self.mapper.install_encoder(key, encoder);
        }
        for (key, decoder) in self.built_decoders {
            self.mapper.install_decoder(key, decoder);
        }
    }

    // -------------------------------------------------------------------------
    // Entry points

    pub fn encoder(&mut self, key: EncoderKey) -> Result<Arc<dyn Encoder>, BindError> {
        if let Some(encoder) = self.mapper.cached_encoder(&key) {
            return Ok(encoder);
        }
        if let Some(forward) = self.pending_encoders.get(&key) {
            return Ok(forward.clone());
        }

        let forward = Arc::new(ForwardEncoder::new(key.runtime));
        self.pending_encoders.insert(key, forward.clone());
        let built = self.build_encoder(&key);
        self.pending_encoders.remove(&key);

        let built = built?;
        forward.fill(built.clone());
        self.built_encoders.push((key, built.clone()));
        Ok(built)
    }

    pub fn decoder(&mut self, key: DecoderKey) -> Result<Arc<dyn Decoder>, BindError> {
        if let Some(decoder) = self.mapper.cached_decoder(&key) {
            return Ok(decoder);
        }
        if let Some(forward) = self.pending_decoders.get(&key) {
            return Ok(forward.clone());
        }

        let forward = Arc::new(ForwardDecoder::new(key.ty));
        self.pending_decoders.insert(key, forward.clone());
        let built = self.build_decoder(&key);
        self.pending_decoders.remove(&key);

        let built = built?;
        forward.fill(built.clone());
        self.built_decoders.push((key, built.clone()));
        Ok(built)
    }

    // -------------------------------------------------------------------------
    // Helpers

    /// Runs `f` with a reference from `owner` pushed onto the chain.
    fn follow<R>(
        &mut self,
        owner: &TypeKey,
        via: String,
        f: impl FnOnce(&mut Self) -> Result<R, BindError>,
    ) -> Result<R, BindError> {
        self.chain.push(ReferenceLink {
            owner: owner.path(),
            via,
        });
        let result = f(self);
        self.chain.pop();
        result
    }

    fn unresolved(&self, ty: &TypeKey) -> BindError {
        ResolveError::UnresolvedType {
            ty: ty.path(),
            chain: ReferenceChain(self.chain.clone()),
        }
        .into()
    }

    fn decl(&self, ty: &TypeKey) -> Result<&'m TypeDecl, BindError> {
        self.mapper
            .registry()
            .get(ty.id())
            .ok_or_else(|| self.unresolved(ty))
    }

    /// The discriminator settings of a record type, if it has any.
    fn type_info(
        &self,
        ty: &TypeKey,
    ) -> Result<Option<(TypeInfoSpec, Arc<AnnotatedType>)>, BindError> {
        if self.decl(ty)?.as_record().is_none() {
            return Ok(None);
        }
        let annotated = self.mapper.annotated(ty)?;
        Ok(annotated
            .directives()
            .type_info()
            .cloned()
            .map(|spec| (spec, annotated)))
    }

    /// The supertypes of a record, most-derived first, for override lookup.
    fn supertypes(&self, ty: &TypeKey) -> Vec<TypeKey> {
        match self.decl(ty).ok().and_then(TypeDecl::as_record) {
            Some(_) => self
                .mapper
                .annotated(ty)
                .map(|annotated| annotated.chain().iter().map(|s| s.key).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Encoders

    /// An override registered for the type or one of its supertypes, or a
    /// converter named by the type's own directives.
    fn explicit_encoder(&self, ty: &TypeKey) -> Result<Option<Arc<dyn Encoder>>, BindError> {
        if let Some(encoder) = self.mapper.encoder_override(ty) {
            return Ok(Some(encoder));
        }
        for supertype in self.supertypes(ty) {
            if let Some(encoder) = self.mapper.encoder_override(&supertype) {
                return Ok(Some(encoder));
            }
        }
        if self.decl(ty)?.as_record().is_some() {
            let annotated = self.mapper.annotated(ty)?;
            if let Some(converter) = annotated.directives().converter() {
                return Ok(converter.encoder.clone());
            }
        }
        Ok(None)
    }

    fn build_encoder(&mut self, key: &EncoderKey) -> Result<Arc<dyn Encoder>, BindError> {
        let runtime = key.runtime;
        if let Some(base) = key.declared {
            return self.typed_encoder(&runtime, &base);
        }
        if let Some(encoder) = self.explicit_encoder(&runtime)? {
            return Ok(encoder);
        }
        if let Some((_, annotated)) = self.type_info(&runtime)? {
            return match annotated.kind() {
                ClassKind::Abstract => Ok(Arc::new(PolymorphicEncoder::new(
                    runtime,
                    annotated.view().cloned(),
                ))),
                ClassKind::Concrete => self.typed_encoder(&runtime, &runtime),
            };
        }
        self.value_encoder(&runtime)
    }

    /// Writes `runtime` with the discriminator of `base`.
    fn typed_encoder(
        &mut self,
        runtime: &TypeKey,
        base: &TypeKey,
    ) -> Result<Arc<dyn Encoder>, BindError> {
        let spec = self
            .type_info(base)?
            .map(|(spec, _)| spec)
            .unwrap_or_default();
        let id = self.mapper.type_table(base)?.id_for(runtime);
        let inner = self.value_encoder(runtime)?;
        Ok(Arc::new(TypedEncoder::new(&spec, id, inner)))
    }

    /// The encoder of the plain value, without a discriminator.
    fn value_encoder(&mut self, ty: &TypeKey) -> Result<Arc<dyn Encoder>, BindError> {
        if let Some(encoder) = self.explicit_encoder(ty)? {
            return Ok(encoder);
        }
        if let Some(encoder) = self.mapper.standard().encoder(ty.id()) {
            return Ok(encoder.clone());
        }

        let decl = self.decl(ty)?;
        self.mapper.count_structural_build();
        let encoder: Arc<dyn Encoder> = match decl {
            TypeDecl::Scalar(_) => return Err(self.unresolved(ty)),
            TypeDecl::Sequence(seq) => Arc::new(SequenceEncoder {
                key: *ty,
                iter: seq.iter.clone(),
                element: self.follow(ty, String::from("[]"), |r| {
                    r.encoder(EncoderKey::of(seq.element))
                })?,
            }),
            TypeDecl::Map(map) => Arc::new(MapEncoder {
                key: *ty,
                entries: map.entries.clone(),
                value: self.follow(ty, String::from("{}"), |r| {
                    r.encoder(EncoderKey::of(map.value))
                })?,
                sort: self.mapper.config().order_map_entries_by_keys && !map.sorted,
            }),
            TypeDecl::Optional(optional) => Arc::new(OptionalEncoder {
                get: optional.get.clone(),
                inner: self.follow(ty, String::from("?"), |r| {
                    r.encoder(EncoderKey::of(optional.inner))
                })?,
            }),
            TypeDecl::Pointer(pointer) => Arc::new(PointerEncoder {
                key: *ty,
                deref: pointer.deref.clone(),
                inner: self.follow(ty, String::from("*"), |r| {
                    r.encoder(EncoderKey::of(pointer.inner))
                })?,
            }),
            TypeDecl::Enum(decl) => Arc::new(EnumConverter {
                key: *ty,
                variants: decl.variants.clone(),
                index_of: decl.index_of.clone(),
                from_index: decl.from_index.clone(),
            }),
            TypeDecl::Record(_) => return self.record_encoder(ty),
        };
        Ok(encoder)
    }

    fn record_encoder(&mut self, ty: &TypeKey) -> Result<Arc<dyn Encoder>, BindError> {
        let annotated = self.mapper.annotated(ty)?;
        if annotated.kind() == ClassKind::Abstract {
            return match annotated.view() {
                Some(view) => Ok(Arc::new(DynamicEncoder::new(*ty, view.clone()))),
                None => Err(self.unresolved(ty)),
            };
        }

        let descriptor = self.mapper.descriptor(ty)?;
        let mut properties = Vec::with_capacity(descriptor.encode.properties.len());
        for property in &descriptor.encode.properties {
            let encoder = match &property.converter {
                Some(converter) => converter.clone(),
                None => self.follow(ty, format!(".{}", property.name), |r| {
                    r.encoder(EncoderKey::of(property.value_type))
                })?,
            };
            properties.push(PropertyWriter {
                name: property.name.clone(),
                get: property.get.clone(),
                encoder,
                inclusion: property.inclusion,
            });
        }

        let any_getter = match &descriptor.encode.any_getter {
            Some(any) => Some(AnyWriter {
                get: any.get.clone(),
                entries: any.entries.clone(),
                value: self.follow(ty, format!(".{}{{}}", any.member), |r| {
                    r.encoder(EncoderKey::of(any.value_type))
                })?,
            }),
            None => None,
        };

        Ok(Arc::new(RecordEncoder {
            key: *ty,
            properties,
            any_getter,
        }))
    }

    // -------------------------------------------------------------------------
    // Decoders

    fn explicit_decoder(&self, ty: &TypeKey) -> Result<Option<Arc<dyn Decoder>>, BindError> {
        if let Some(decoder) = self.mapper.decoder_override(ty) {
            return Ok(Some(decoder));
        }
        if self.decl(ty)?.as_record().is_some() {
            let annotated = self.mapper.annotated(ty)?;
            if let Some(converter) = annotated.directives().converter() {
                return Ok(converter.decoder.clone());
            }
        }
        Ok(None)
    }

    fn build_decoder(&mut self, key: &DecoderKey) -> Result<Arc<dyn Decoder>, BindError> {
        let ty = key.ty;
        if key.typed {
            if let Some(decoder) = self.explicit_decoder(&ty)? {
                return Ok(decoder);
            }
            if let Some((spec, annotated)) = self.type_info(&ty)? {
                return Ok(Arc::new(PolymorphicDecoder::new(ty, annotated.kind(), spec)));
            }
        }
        self.value_decoder(&ty)
    }

    fn value_decoder(&mut self, ty: &TypeKey) -> Result<Arc<dyn Decoder>, BindError> {
        if let Some(decoder) = self.explicit_decoder(ty)? {
            return Ok(decoder);
        }
        if let Some(decoder) = self.mapper.standard().decoder(ty.id()) {
            return Ok(decoder.clone());
        }

        let decl = self.decl(ty)?;
        self.mapper.count_structural_build();
        let decoder: Arc<dyn Decoder> = match decl {
            TypeDecl::Scalar(_) => return Err(self.unresolved(ty)),
            TypeDecl::Sequence(seq) => Arc::new(SequenceDecoder {
                build: seq.build.clone(),
                element: self.follow(ty, String::from("[]"), |r| {
                    r.decoder(DecoderKey::typed(seq.element))
                })?,
            }),
            TypeDecl::Map(map) => Arc::new(MapDecoder {
                empty: map.empty.clone(),
                insert: map.insert.clone(),
                value: self.follow(ty, String::from("{}"), |r| {
                    r.decoder(DecoderKey::typed(map.value))
                })?,
            }),
            TypeDecl::Optional(optional) => Arc::new(OptionalDecoder {
                some: optional.some.clone(),
                none: optional.none.clone(),
                inner: self.follow(ty, String::from("?"), |r| {
                    r.decoder(DecoderKey::typed(optional.inner))
                })?,
            }),
            TypeDecl::Pointer(pointer) => Arc::new(PointerDecoder {
                wrap: pointer.wrap.clone(),
                inner: self.follow(ty, String::from("*"), |r| {
                    r.decoder(DecoderKey::typed(pointer.inner))
                })?,
            }),
            TypeDecl::Enum(decl) => Arc::new(EnumConverter {
                key: *ty,
                variants: decl.variants.clone(),
                index_of: decl.index_of.clone(),
                from_index: decl.from_index.clone(),
            }),
            TypeDecl::Record(_) => return self.record_decoder(ty),
        };
        Ok(decoder)
    }

    fn record_decoder(&mut self, ty: &TypeKey) -> Result<Arc<dyn Decoder>, BindError> {
        let annotated = self.mapper.annotated(ty)?;
        if annotated.kind() == ClassKind::Abstract {
            return Err(ResolveError::AbstractType { ty: ty.path() }.into());
        }

        let descriptor = self.mapper.descriptor(ty)?;
        let view = &descriptor.decode;
        let creator = view
            .creator
            .as_ref()
            .ok_or(ResolveError::MissingCreator { ty: ty.path() })?;

        let mut properties = Vec::with_capacity(view.properties.len());
        for property in &view.properties {
            let decoder = match &property.converter {
                Some(converter) => converter.clone(),
                None => self.follow(ty, format!(".{}", property.name), |r| {
                    r.decoder(DecoderKey::typed(property.value_type))
                })?,
            };
            properties.push(PropertyReader {
                name: property.name.clone(),
                target: property.target.clone(),
                decoder,
            });
        }

        let construct = match creator.kind {
            CreatorKind::Default => Construct::Default(creator.invoke.clone()),
            CreatorKind::Properties => {
                let slots = (0..creator.params.len())
                    .map(|index| {
                        view.properties.iter().position(
                            |p| matches!(p.target, SetTarget::Creator(i) if i == index),
                        )
                    })
                    .collect::<Option<Vec<usize>>>()
                    .ok_or(ResolveError::MissingCreator { ty: ty.path() })?;
                Construct::Properties {
                    invoke: creator.invoke.clone(),
                    slots,
                }
            }
            CreatorKind::Delegating => {
                let param = creator
                    .params
                    .first()
                    .ok_or(ResolveError::MissingCreator { ty: ty.path() })?;
                let decoder = match &param.converter {
                    Some(converter) => converter.clone(),
                    None => self.follow(ty, format!("::{}(_)", creator.name), |r| {
                        r.decoder(DecoderKey::typed(param.value_type))
                    })?,
                };
                Construct::Delegating {
                    invoke: creator.invoke.clone(),
                    decoder,
                }
            }
        };

        let any_setter = match &view.any_setter {
            Some(any) => {
                let decoder = self.follow(ty, String::from(".{}"), |r| {
                    r.decoder(DecoderKey::typed(*any.value_type()))
                })?;
                Some(match any {
                    AnySetter::Entry { set, .. } => AnyReader::Entry {
                        set: set.clone(),
                        decoder,
                    },
                    AnySetter::Map {
                        get_mut, insert, ..
                    } => AnyReader::Map {
                        get_mut: get_mut.clone(),
                        insert: insert.clone(),
                        decoder,
                    },
                })
            }
            None => None,
        };

        let managed = self.managed_fixups(ty, view.managed.as_slice())?;
        let back_handle = annotated.back_handle().cloned();
        if !managed.is_empty() && back_handle.is_none() {
            debug!(
                "`{}` manages references but declares no back handle; back references stay unset",
                ty.path()
            );
        }

        Ok(Arc::new(RecordDecoder {
            key: *ty,
            construct,
            properties,
            lookup: view.lookup.clone(),
            any_setter,
            ignored: view.ignored.clone(),
            fail_on_unknown: self.mapper.config().fail_on_unknown_properties
                && !view.ignore_unknown,
            managed,
            back_handle,
        }))
    }

    /// Pairs each managed reference with the back-reference setter of its
    /// child type. Children are a record or a sequence of records.
    fn managed_fixups(
        &self,
        ty: &TypeKey,
        managed: &[crate::descriptor::ManagedReference],
    ) -> Result<Vec<ManagedFixup>, BindError> {
        let mut fixups = Vec::with_capacity(managed.len());
        for reference in managed {
            let (children, child) = match self.decl(&reference.value_type)? {
                TypeDecl::Record(_) => (ChildAccess::Single, reference.value_type),
                TypeDecl::Sequence(seq) => (
                    ChildAccess::Many {
                        iter: seq.iter.clone(),
                        iter_mut: seq.iter_mut.clone(),
                    },
                    seq.element,
                ),
                _ => {
                    debug!(
                        "managed reference `{}` of `{}` holds neither a record nor a sequence; skipped",
                        reference.property,
                        ty.path()
                    );
                    continue;
                }
            };

            let child_descriptor = self.mapper.descriptor(&child)?;
            let Some(set_back) = child_descriptor
                .decode
                .back_references
                .get(&reference.reference)
            else {
                debug!(
                    "`{}` has no back reference named `{}`; skipped",
                    child.path(),
                    reference.reference
                );
                continue;
            };

            fixups.push(ManagedFixup {
                property: reference.property.clone(),
                get: reference.get.clone(),
                get_mut: reference.get_mut.clone(),
                children,
                set_back: set_back.clone(),
            });
        }
        Ok(fixups)
    }
}
