//! The entry point tying declarations, settings and caches together.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use alloc::sync::Arc;
use core::any::{Any, TypeId, type_name};
use core::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};

use crate::cache::SnapshotTable;
use crate::config::MapperConfig;
use crate::convert::{DecodeContext, Decoder, DecoderKey, EncodeContext, Encoder, EncoderKey};
use crate::convert::{Resolver, StandardConverters};
use crate::descriptor::{DescriptorOptions, TypeDescriptor, build_descriptor};
use crate::error::{BindError, ConfigError, ValueError};
use crate::hash::HashMap;
use crate::info::{ClassDecl, ClassKind, DefaultVisibilityChecker, GetTypeDecl, NamedType};
use crate::info::{TypeDecl, TypeKey, VisibilityChecker, WrapFn};
use crate::introspect::{AnnotatedType, MergeOptions, collect, merge};
use crate::poly::TypeIdTable;
use crate::registry::{MetadataRegistry, OverlayRegistry, SubtypeRegistry, TypeNameLookup};
use crate::token::{TokenReader, TokenWriter};

// -----------------------------------------------------------------------------
// Statistics

/// Counters of the work a [`Mapper`] has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperStats {
    pub annotated_builds: u64,
    pub descriptor_builds: u64,
    /// Converters built from a type's structural category.
    pub structural_builds: u64,
    /// Converter lookups answered from the cache.
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Default)]
struct Counters {
    annotated_builds: AtomicU64,
    descriptor_builds: AtomicU64,
    structural_builds: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// -----------------------------------------------------------------------------
// MapperBuilder

/// Configures a [`Mapper`].
///
/// # Examples
///
/// ```
/// use vc_bind::{Mapper, MapperConfig};
///
/// let mapper = Mapper::builder()
///     .register::<Vec<String>>()
///     .configure(|config| config.max_depth = 32)
///     .build();
/// assert_eq!(mapper.config().max_depth, 32);
/// ```
pub struct MapperBuilder {
    registry: MetadataRegistry,
    overlays: OverlayRegistry,
    subtypes: SubtypeRegistry,
    config: MapperConfig,
    standard: StandardConverters,
    encoder_overrides: HashMap<TypeId, Arc<dyn Encoder>>,
    decoder_overrides: HashMap<TypeId, Arc<dyn Decoder>>,
    checker: Arc<dyn VisibilityChecker>,
    type_lookup: Option<Arc<dyn TypeNameLookup>>,
    registry_lookup: bool,
}

impl Default for MapperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperBuilder {
    pub fn new() -> Self {
        Self {
            registry: MetadataRegistry::new(),
            overlays: OverlayRegistry::new(),
            subtypes: SubtypeRegistry::new(),
            config: MapperConfig::default(),
            standard: StandardConverters::new(),
            encoder_overrides: HashMap::default(),
            decoder_overrides: HashMap::default(),
            checker: Arc::new(DefaultVisibilityChecker),
            type_lookup: None,
            registry_lookup: true,
        }
    }

    /// Registers `T` and the types its declaration depends on.
    pub fn register<T: GetTypeDecl>(mut self) -> Self {
        self.registry.register::<T>();
        self
    }

    /// Registers a declaration built by hand.
    pub fn insert_decl(mut self, decl: TypeDecl) -> Self {
        let path = decl.key().path();
        if !self.registry.insert_decl(decl) {
            debug!("`{path}` is already registered; the new declaration is ignored");
        }
        self
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Edits the current settings in place.
    pub fn configure(mut self, edit: impl FnOnce(&mut MapperConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Attaches a directive-only declaration to the type it is keyed by.
    pub fn overlay(mut self, overlay: ClassDecl) -> Self {
        let target = *overlay.key();
        if self.overlays.insert(target, overlay).is_some() {
            warn!("overlay for `{}` replaced", target.path());
        }
        self
    }

    /// Sets the overlay applied to every record type.
    pub fn root_overlay(mut self, overlay: ClassDecl) -> Self {
        self.overlays.set_root(overlay);
        self
    }

    /// Registers `S` as a subtype of the polymorphic base `B`.
    pub fn subtype<B: GetTypeDecl, S: GetTypeDecl>(self) -> Self {
        self.add_subtype::<B>(NamedType::of::<S>())
    }

    /// Registers `S` as a subtype of `B` under a logical name.
    pub fn named_subtype<B: GetTypeDecl, S: GetTypeDecl>(self, name: &str) -> Self {
        self.add_subtype::<B>(NamedType::of::<S>().named(name))
    }

    fn add_subtype<B: GetTypeDecl>(mut self, subtype: NamedType) -> Self {
        self.registry.register::<B>();
        if let Some(register) = subtype.register_fn() {
            register(&mut self.registry);
        }
        self.subtypes.insert(TypeKey::of::<B>(), subtype);
        self
    }

    /// Replaces the encoder of `T` and of its subtypes.
    pub fn override_encoder<T: Any>(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder_overrides.insert(TypeId::of::<T>(), Arc::new(encoder));
        self
    }

    /// Replaces the decoder of `T`.
    pub fn override_decoder<T: Any>(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder_overrides.insert(TypeId::of::<T>(), Arc::new(decoder));
        self
    }

    /// Replaces both converters of `T` with one value.
    pub fn override_converter<T: Any, C>(mut self, converter: C) -> Self
    where
        C: Encoder + Decoder + 'static,
    {
        let converter = Arc::new(converter);
        self.encoder_overrides.insert(TypeId::of::<T>(), converter.clone());
        self.decoder_overrides.insert(TypeId::of::<T>(), converter);
        self
    }

    pub fn visibility_checker(mut self, checker: impl VisibilityChecker + 'static) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    /// Resolves class-style type ids missing from a base's id table.
    pub fn type_lookup(mut self, lookup: impl TypeNameLookup + 'static) -> Self {
        self.type_lookup = Some(Arc::new(lookup));
        self
    }

    /// Whether class-style type ids fall back to the registered type paths
    /// when no [`type_lookup`](Self::type_lookup) is set. On by default.
    pub fn use_registry_type_lookup(mut self, enabled: bool) -> Self {
        self.registry_lookup = enabled;
        self
    }

    pub fn build(self) -> Mapper {
        Mapper {
            registry: self.registry,
            overlays: self.overlays,
            subtypes: self.subtypes,
            config: self.config,
            standard: self.standard,
            encoder_overrides: self.encoder_overrides,
            decoder_overrides: self.decoder_overrides,
            checker: self.checker,
            type_lookup: self.type_lookup,
            registry_lookup: self.registry_lookup,
            annotated: SnapshotTable::new("annotated type"),
            descriptors: SnapshotTable::new("descriptor"),
            tables: SnapshotTable::new("type id table"),
            encoders: SnapshotTable::new("encoder"),
            decoders: SnapshotTable::new("decoder"),
            counters: Counters::default(),
        }
    }
}

// -----------------------------------------------------------------------------
// Mapper

/// Converts registered types to and from token streams.
///
/// A mapper is immutable once built and safe to share between threads.
/// Everything derived from declarations is built on first use and cached;
/// concurrent first uses may build the same converter more than once, but
/// only one is kept.
pub struct Mapper {
    registry: MetadataRegistry,
    overlays: OverlayRegistry,
    subtypes: SubtypeRegistry,
    config: MapperConfig,
    standard: StandardConverters,
    encoder_overrides: HashMap<TypeId, Arc<dyn Encoder>>,
    decoder_overrides: HashMap<TypeId, Arc<dyn Decoder>>,
    checker: Arc<dyn VisibilityChecker>,
    type_lookup: Option<Arc<dyn TypeNameLookup>>,
    registry_lookup: bool,

    annotated: SnapshotTable<TypeId, Arc<AnnotatedType>>,
    descriptors: SnapshotTable<TypeId, Result<Arc<TypeDescriptor>, ConfigError>>,
    tables: SnapshotTable<TypeId, Arc<TypeIdTable>>,
    encoders: SnapshotTable<EncoderKey, Arc<dyn Encoder>>,
    decoders: SnapshotTable<DecoderKey, Arc<dyn Decoder>>,
    counters: Counters,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper {
    /// A mapper with default settings and only the primitive types.
    #[inline]
    pub fn new() -> Self {
        MapperBuilder::new().build()
    }

    #[inline]
    pub fn builder() -> MapperBuilder {
        MapperBuilder::new()
    }

    #[inline]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn stats(&self) -> MapperStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MapperStats {
            annotated_builds: load(&self.counters.annotated_builds),
            descriptor_builds: load(&self.counters.descriptor_builds),
            structural_builds: load(&self.counters.structural_builds),
            cache_hits: load(&self.counters.cache_hits),
            cache_misses: load(&self.counters.cache_misses),
        }
    }

    /// Drops every cached converter, descriptor and annotated type.
    ///
    /// Converters already handed out stay usable.
    pub fn flush_caches(&self) {
        self.encoders.clear();
        self.decoders.clear();
        self.tables.clear();
        self.descriptors.clear();
        self.annotated.clear();
        debug!("mapper caches flushed");
    }

    // -------------------------------------------------------------------------
    // Conversion

    /// Writes `value` as a document.
    pub fn encode<T: Any>(&self, value: &T, writer: &mut dyn TokenWriter) -> Result<(), BindError> {
        let encoder = self.encoder_for::<T>()?;
        let mut ctx = EncodeContext::new(self);
        encoder.encode(value, writer, &mut ctx)
    }

    /// Reads a document from a fresh reader, positioned before its first
    /// token.
    pub fn decode<T: Any>(&self, reader: &mut dyn TokenReader) -> Result<T, BindError> {
        reader.advance()?;
        let value = self.decode_value::<T>(reader)?;
        if self.config.fail_on_trailing_tokens {
            reader.advance()?;
            if reader.current().is_some() {
                return Err(ValueError::TrailingTokens.into());
            }
        }
        Ok(value)
    }

    /// Reads one value; the reader is positioned on its first token and is
    /// left on its last.
    pub fn decode_value<T: Any>(&self, reader: &mut dyn TokenReader) -> Result<T, BindError> {
        let decoder = self.decoder_for::<T>()?;
        let mut ctx = DecodeContext::new(self);
        let value: Box<dyn Any> = decoder.decode(reader, &mut ctx)?;
        value.downcast::<T>().map(|value| *value).map_err(|_| {
            ValueError::TypeMismatch {
                expected: type_name::<T>(),
                found: "a value of another type",
            }
            .into()
        })
    }

    /// The encoder of `T`, honoring its type discriminator.
    #[inline]
    pub fn encoder_for<T: Any>(&self) -> Result<Arc<dyn Encoder>, BindError> {
        self.resolve_encoder(EncoderKey::of(TypeKey::of::<T>()))
    }

    /// The decoder of `T`, honoring its type discriminator.
    #[inline]
    pub fn decoder_for<T: Any>(&self) -> Result<Arc<dyn Decoder>, BindError> {
        self.resolve_decoder(DecoderKey::typed(TypeKey::of::<T>()))
    }

    // -------------------------------------------------------------------------
    // Resolution

    pub fn resolve_encoder(&self, key: EncoderKey) -> Result<Arc<dyn Encoder>, BindError> {
        if let Some(encoder) = self.encoders.get(&key) {
            bump(&self.counters.cache_hits);
            return Ok(encoder);
        }
        bump(&self.counters.cache_misses);
        trace!("encoder cache miss for `{}`", key.runtime.path());

        let mut resolver = Resolver::new(self);
        let encoder = resolver.encoder(key)?;
        resolver.commit();
        Ok(self.encoders.get(&key).unwrap_or(encoder))
    }

    pub fn resolve_decoder(&self, key: DecoderKey) -> Result<Arc<dyn Decoder>, BindError> {
        if let Some(decoder) = self.decoders.get(&key) {
            bump(&self.counters.cache_hits);
            return Ok(decoder);
        }
        bump(&self.counters.cache_misses);
        trace!("decoder cache miss for `{}`", key.ty.path());

        let mut resolver = Resolver::new(self);
        let decoder = resolver.decoder(key)?;
        resolver.commit();
        Ok(self.decoders.get(&key).unwrap_or(decoder))
    }

    /// The merged hierarchy, members and directives of a record type.
    pub fn annotated(&self, ty: &TypeKey) -> Result<Arc<AnnotatedType>, BindError> {
        if let Some(annotated) = self.annotated.get(&ty.id()) {
            return Ok(annotated);
        }
        let annotated = Arc::new(collect(&self.registry, &self.overlays, ty)?);
        bump(&self.counters.annotated_builds);
        Ok(self.annotated.insert(ty.id(), annotated))
    }

    /// The property views of a record type.
    ///
    /// Configuration conflicts are reported on every call but only
    /// computed once.
    pub fn descriptor(&self, ty: &TypeKey) -> Result<Arc<TypeDescriptor>, BindError> {
        if let Some(descriptor) = self.descriptors.get(&ty.id()) {
            return descriptor.map_err(BindError::from);
        }

        let annotated = self.annotated(ty)?;
        let model = merge(
            &annotated,
            &MergeOptions {
                naming: self.config.naming,
                policy: self.config.visibility,
                checker: &*self.checker,
                infer_property_mutators: self.config.infer_property_mutators,
            },
        );
        let built = build_descriptor(
            &annotated,
            &model,
            &self.registry,
            &DescriptorOptions {
                sort_alphabetically: self.config.sort_properties_alphabetically,
                default_inclusion: self.config.default_inclusion,
                policy: self.config.visibility,
                checker: &*self.checker,
            },
        );
        bump(&self.counters.descriptor_builds);

        match &built {
            Ok(descriptor) => debug!(
                "descriptor of `{}`: {} encoded and {} decoded properties",
                ty.path(),
                descriptor.encode.properties.len(),
                descriptor.decode.properties.len(),
            ),
            Err(error) => warn!("invalid binding configuration of `{}`: {error}", ty.path()),
        }
        self.descriptors
            .insert(ty.id(), built.map(Arc::new))
            .map_err(BindError::from)
    }

    /// The id table of a polymorphic base.
    pub fn type_table(&self, base: &TypeKey) -> Result<Arc<TypeIdTable>, BindError> {
        if let Some(table) = self.tables.get(&base.id()) {
            return Ok(table);
        }

        let annotated = self.annotated(base)?;
        let spec = annotated.directives().type_info().cloned().unwrap_or_default();
        let mut table = TypeIdTable::new(*base, spec.id);

        let declared = annotated.directives().subtypes().unwrap_or(&[]);
        let registered = core::iter::once(base)
            .chain(annotated.chain().iter().map(|supertype| &supertype.key))
            .flat_map(|ty| self.subtypes.subtypes(ty.id()));
        for named in declared.iter().chain(registered) {
            let ty = *named.type_key();
            if !self.is_assignable(&ty, base) {
                continue;
            }
            let type_name = self.own_type_name(&ty);
            table.insert(ty, named.name(), type_name.as_deref());
        }
        if annotated.kind() == ClassKind::Concrete {
            let type_name = self.own_type_name(base);
            table.insert(*base, None, type_name.as_deref());
        }

        debug!("type ids of `{}`: {:?}", base.path(), table.ids().collect::<Vec<_>>());
        Ok(self.tables.insert(base.id(), Arc::new(table)))
    }

    /// Returns `true` if values of `ty` may stand for values of `base`.
    pub fn is_assignable(&self, ty: &TypeKey, base: &TypeKey) -> bool {
        if ty == base {
            return true;
        }
        let is_record = self
            .registry
            .get(ty.id())
            .is_some_and(|decl| decl.as_record().is_some());
        is_record && self.annotated(ty).is_ok_and(|annotated| annotated.is_a(base))
    }

    /// The key of a registered type.
    #[inline]
    pub fn key_of(&self, id: TypeId) -> Option<TypeKey> {
        self.registry.get(id).map(|decl| *decl.key())
    }

    /// Resolves a full type path through the configured lookup.
    pub fn lookup_path(&self, path: &str) -> Option<TypeKey> {
        let id = match &self.type_lookup {
            Some(lookup) => lookup.type_for_path(path),
            None if self.registry_lookup => self.registry.type_for_path(path),
            None => None,
        }?;
        self.key_of(id)
    }

    /// The conversion of a `ty` value into a `base` value.
    pub fn upcast(&self, ty: &TypeKey, base: &TypeKey) -> Option<WrapFn> {
        self.registry
            .get(ty.id())?
            .as_record()?
            .upcast_to(base)
            .cloned()
    }

    // -------------------------------------------------------------------------
    // Resolver support

    /// The `TypeName` directive a type declares itself, overlay first.
    fn own_type_name(&self, ty: &TypeKey) -> Option<String> {
        let overlay = self.overlays.get(ty.id()).map(ClassDecl::directives);
        let own = self
            .registry
            .get(ty.id())
            .and_then(TypeDecl::as_record)
            .map(ClassDecl::directives);
        overlay
            .and_then(|d| d.type_name())
            .or_else(|| own.and_then(|d| d.type_name()))
            .map(String::from)
    }

    #[inline]
    pub(crate) fn standard(&self) -> &StandardConverters {
        &self.standard
    }

    #[inline]
    pub(crate) fn encoder_override(&self, ty: &TypeKey) -> Option<Arc<dyn Encoder>> {
        self.encoder_overrides.get(&ty.id()).cloned()
    }

    #[inline]
    pub(crate) fn decoder_override(&self, ty: &TypeKey) -> Option<Arc<dyn Decoder>> {
        self.decoder_overrides.get(&ty.id()).cloned()
    }

    #[inline]
    pub(crate) fn cached_encoder(&self, key: &EncoderKey) -> Option<Arc<dyn Encoder>> {
        self.encoders.get(key)
    }

    #[inline]
    pub(crate) fn cached_decoder(&self, key: &DecoderKey) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(key)
    }

    #[inline]
    pub(crate) fn install_encoder(&self, key: EncoderKey, encoder: Arc<dyn Encoder>) {
        self.encoders.insert(key, encoder);
    }

    #[inline]
    pub(crate) fn install_decoder(&self, key: DecoderKey, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(key, decoder);
    }

    #[inline]
    pub(crate) fn count_structural_build(&self) {
        bump(&self.counters.structural_builds);
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::vec;

    use super::*;
    use crate::convert::downcast;
    use crate::error::ValueError;
    use crate::info::MemberDecl;
    use crate::token::{Token, TokenBuffer};

    #[derive(Default)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl GetTypeDecl for Point {
        fn type_decl() -> TypeDecl {
            crate::info::ClassBuilder::<Point>::new()
                .field("x", |p| &p.x, |p| &mut p.x)
                .field("y", |p| &p.y, |p| &mut p.y)
                .default_creator(Point::default)
                .build()
        }
    }

    /// Exposes itself as a property.
    #[derive(Default)]
    struct Node {
        id: i32,
    }

    impl GetTypeDecl for Node {
        fn type_decl() -> TypeDecl {
            crate::info::ClassBuilder::<Node>::new()
                .field("id", |n| &n.id, |n| &mut n.id)
                .member(MemberDecl::accessor_ref::<Node, Node>("myself", |n| n))
                .default_creator(Node::default)
                .build()
        }
    }

    struct HexEncoder;

    impl Encoder for HexEncoder {
        fn encode(
            &self,
            value: &dyn Any,
            writer: &mut dyn TokenWriter,
            _ctx: &mut EncodeContext<'_>,
        ) -> Result<(), BindError> {
            let value = downcast::<i32>(value)?;
            writer.write_str(&format!("{value:x}"))
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mapper = Mapper::builder().register::<Node>().build();
        let error = mapper
            .encode(&Node { id: 1 }, &mut TokenBuffer::new())
            .unwrap_err();

        assert!(matches!(
            error,
            BindError::Value {
                error: ValueError::Cycle { .. },
                ..
            }
        ));
        assert_eq!(error.path().unwrap().to_string(), "$.myself");
    }

    #[test]
    fn depth_limit_without_cycle_detection() {
        let mapper = Mapper::builder()
            .register::<Node>()
            .configure(|config| {
                config.detect_cycles = false;
                config.max_depth = 8;
            })
            .build();
        let error = mapper
            .encode(&Node { id: 1 }, &mut TokenBuffer::new())
            .unwrap_err();

        assert!(matches!(
            error,
            BindError::Value {
                error: ValueError::DepthExceeded { limit: 8 },
                ..
            }
        ));
    }

    #[test]
    fn converters_are_built_once() {
        let mapper = Mapper::builder().register::<Point>().build();
        let point = Point { x: 1, y: 2 };

        mapper.encode(&point, &mut TokenBuffer::new()).unwrap();
        mapper.encode(&point, &mut TokenBuffer::new()).unwrap();

        let stats = mapper.stats();
        assert_eq!(stats.annotated_builds, 1);
        assert_eq!(stats.descriptor_builds, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn flush_forces_rebuilds() {
        let mapper = Mapper::builder().register::<Point>().build();
        let point = Point { x: 1, y: 2 };

        let before = mapper.encoder_for::<Point>().unwrap();
        mapper.flush_caches();
        mapper.encode(&point, &mut TokenBuffer::new()).unwrap();

        let stats = mapper.stats();
        assert_eq!(stats.descriptor_builds, 2);
        assert_eq!(stats.cache_misses, 2);

        // Converters handed out before the flush still work.
        let mut buffer = TokenBuffer::new();
        before.encode(&point, &mut buffer, &mut EncodeContext::new(&mapper)).unwrap();
        assert_eq!(buffer.tokens().len(), 6);
    }

    #[test]
    fn encoder_override_replaces_the_standard_one() {
        let mapper = Mapper::builder()
            .register::<Point>()
            .override_encoder::<i32>(HexEncoder)
            .build();

        let mut buffer = TokenBuffer::new();
        mapper.encode(&Point { x: 255, y: 16 }, &mut buffer).unwrap();
        assert_eq!(
            buffer.into_tokens(),
            vec![
                Token::StartObject,
                Token::FieldName("x".into()),
                Token::String("ff".into()),
                Token::FieldName("y".into()),
                Token::String("10".into()),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn decode_rejects_the_wrong_target() {
        let mapper = Mapper::new();
        let mut reader = crate::token::BufferReader::new(vec![Token::Bool(true)]);
        let error = mapper.decode_value::<i32>(&mut reader).unwrap_err();

        assert!(matches!(
            error,
            BindError::Value {
                error: ValueError::UnexpectedToken { .. },
                ..
            }
        ));
    }

    #[test]
    fn unknown_types_are_unresolved() {
        struct Unregistered;

        let error = Mapper::new().encoder_for::<Unregistered>().err().unwrap();
        assert!(matches!(
            error,
            BindError::Resolve(crate::error::ResolveError::UnresolvedType { .. })
        ));
    }
}
