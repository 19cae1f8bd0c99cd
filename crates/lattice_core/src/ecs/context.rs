//! # Entity Context
//!
//! The central container: component registry, archetypes, entity pool and
//! the registered systems. Passed explicitly; there is no global instance.
//!
//! Archetype 0 always exists and holds entities without components.
//! Archetypes and rows are append-only.

use bytemuck::Pod;

use super::archetype::Archetype;
use super::component::{
    Component, ComponentRegistry, ComponentType, EntitySignature, MAX_SYSTEM_COMPONENT_TYPE_COUNT,
};
use super::entity::{Entity, EntityLocation};
use super::system::{self, EntitySystem};
use crate::config::EcsConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::{Arena, HandlePool};

/// Entity/component store plus system scheduler.
///
/// # Example
///
/// ```rust,ignore
/// let mut ctx = EntityContext::default();
///
/// let mesh = ctx.register_component("Mesh", 32)?;
/// let transform = ctx.register_component("Transform", 48)?;
///
/// let entity = ctx.create_entity_with_components(
///     &[mesh, transform],
///     &[&mesh_bytes, &transform_bytes],
/// )?;
/// assert_eq!(ctx.component_data(entity, mesh)?, &mesh_bytes);
/// ```
pub struct EntityContext {
    config: EcsConfig,
    registry: ComponentRegistry,
    archetypes: Vec<Archetype>,
    entities: HandlePool<EntityLocation>,
    systems: Vec<Box<dyn EntitySystem>>,
}

impl EntityContext {
    /// Creates an empty context sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: EcsConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: EcsConfig) -> Self {
        tracing::info!(
            entity_capacity = config.entity_capacity,
            column_reserve_bytes = config.column_reserve_bytes,
            "entity context created"
        );
        Self {
            registry: ComponentRegistry::new(config.component_table_capacity),
            archetypes: vec![Archetype::empty()],
            entities: HandlePool::new(config.entity_capacity),
            systems: Vec::new(),
            config,
        }
    }

    /// Returns the configuration the context was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &EcsConfig {
        &self.config
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers a component kind, or returns the index of an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponents`] past 64 kinds.
    pub fn register_component(&mut self, name: &str, size: usize) -> EcsResult<Component> {
        self.registry.register(name, size)
    }

    /// Registers a typed component under its [`ComponentType::NAME`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponents`] past 64 kinds.
    pub fn register<T: ComponentType>(&mut self) -> EcsResult<Component> {
        self.registry.register(T::NAME, std::mem::size_of::<T>())
    }

    /// Looks up a component by its registered name.
    #[must_use]
    pub fn component_by_name(&self, name: &str) -> Option<Component> {
        self.registry.by_name(name)
    }

    /// Returns the registered byte size of a component.
    #[must_use]
    pub fn component_size(&self, component: Component) -> Option<usize> {
        self.registry.size_of(component)
    }

    /// Returns the number of registered component kinds.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.registry.len()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with no components (archetype 0).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Pool`] if the entity pool is exhausted.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        self.place(0, &[], &[])
    }

    /// Creates an entity holding one payload per listed component.
    ///
    /// `components` and `datas` are parallel; order does not matter.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DataCountMismatch`] if the lists differ in length
    /// - [`EcsError::UnknownComponent`] for an unregistered component
    /// - [`EcsError::DuplicateComponent`] if a component repeats
    /// - [`EcsError::PayloadSize`] if a payload has the wrong length
    /// - [`EcsError::Pool`] / [`EcsError::Arena`] when capacity runs out
    ///
    /// Nothing is created on error.
    pub fn create_entity_with_components(
        &mut self,
        components: &[Component],
        datas: &[&[u8]],
    ) -> EcsResult<Entity> {
        if components.len() != datas.len() {
            return Err(EcsError::DataCountMismatch {
                components: components.len(),
                datas: datas.len(),
            });
        }

        let mut signature = EntitySignature::EMPTY;
        for (&component, data) in components.iter().zip(datas) {
            let expected = self
                .registry
                .size_of(component)
                .ok_or(EcsError::UnknownComponent(component.index()))?;
            if signature.contains(component) {
                return Err(EcsError::DuplicateComponent(component.index()));
            }
            if data.len() != expected {
                return Err(EcsError::PayloadSize {
                    component: component.index(),
                    expected,
                    actual: data.len(),
                });
            }
            signature.insert(component);
        }

        let archetype = match self.find_archetype(signature) {
            Some(index) => index,
            None => self.create_archetype(signature)?,
        };
        self.place(archetype, components, datas)
    }

    /// Checks if an entity handle is live.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity.handle())
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.allocated_count()
    }

    /// Returns the storage location of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Pool`] for null or stale handles.
    pub fn location(&self, entity: Entity) -> EcsResult<EntityLocation> {
        Ok(*self.entities.access(entity.handle())?)
    }

    /// Returns the index of the archetype holding an entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Pool`] for null or stale handles.
    pub fn archetype_of(&self, entity: Entity) -> EcsResult<usize> {
        Ok(self.location(entity)?.archetype as usize)
    }

    /// Returns the bytes of one of an entity's components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Pool`] for bad handles and
    /// [`EcsError::MissingComponent`] if the entity lacks the component.
    pub fn component_data(&self, entity: Entity, component: Component) -> EcsResult<&[u8]> {
        let location = self.location(entity)?;
        self.archetypes[location.archetype as usize]
            .column(component)
            .and_then(|column| column.row(location.row as usize))
            .ok_or(EcsError::MissingComponent(component.index()))
    }

    /// Returns the bytes of one of an entity's components, mutably.
    ///
    /// # Errors
    ///
    /// Same as [`EntityContext::component_data`].
    pub fn component_data_mut(
        &mut self,
        entity: Entity,
        component: Component,
    ) -> EcsResult<&mut [u8]> {
        let location = self.location(entity)?;
        self.archetypes[location.archetype as usize]
            .column_mut(component)
            .and_then(|column| column.row_mut(location.row as usize))
            .ok_or(EcsError::MissingComponent(component.index()))
    }

    /// Reads one of an entity's components by value.
    ///
    /// # Errors
    ///
    /// Same as [`EntityContext::component_data`], plus
    /// [`EcsError::PayloadSize`] if `T` has the wrong size.
    pub fn component<T: Pod>(&self, entity: Entity, component: Component) -> EcsResult<T> {
        let bytes = self.component_data(entity, component)?;
        if bytes.len() != std::mem::size_of::<T>() {
            return Err(EcsError::PayloadSize {
                component: component.index(),
                expected: bytes.len(),
                actual: std::mem::size_of::<T>(),
            });
        }
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Overwrites one of an entity's components.
    ///
    /// # Errors
    ///
    /// Same as [`EntityContext::component`].
    pub fn set_component<T: Pod>(
        &mut self,
        entity: Entity,
        component: Component,
        value: &T,
    ) -> EcsResult<()> {
        let bytes = self.component_data_mut(entity, component)?;
        if bytes.len() != std::mem::size_of::<T>() {
            return Err(EcsError::PayloadSize {
                component: component.index(),
                expected: bytes.len(),
                actual: std::mem::size_of::<T>(),
            });
        }
        bytes.copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }

    // =========================================================================
    // Archetypes
    // =========================================================================

    /// Returns an archetype by index.
    #[must_use]
    pub fn archetype(&self, index: usize) -> Option<&Archetype> {
        self.archetypes.get(index)
    }

    /// Returns every archetype, in creation order.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    fn find_archetype(&self, signature: EntitySignature) -> Option<usize> {
        self.archetypes
            .iter()
            .position(|archetype| archetype.signature() == signature)
    }

    fn create_archetype(&mut self, signature: EntitySignature) -> EcsResult<usize> {
        // Signature iteration is ascending, so the layout comes out sorted.
        let layout = signature
            .iter()
            .map(|component| {
                self.registry
                    .size_of(component)
                    .map(|size| (component, size))
                    .ok_or(EcsError::UnknownComponent(component.index()))
            })
            .collect::<EcsResult<Vec<_>>>()?;

        let archetype = Archetype::new(
            signature,
            &layout,
            self.config.column_reserve_bytes,
            self.config.column_commit_bytes,
        )?;
        self.archetypes.push(archetype);

        let index = self.archetypes.len() - 1;
        tracing::debug!(
            archetype = index,
            signature = signature.bits(),
            columns = layout.len(),
            "archetype created"
        );
        Ok(index)
    }

    /// Appends a row to archetype `index` and issues its handle.
    #[allow(clippy::cast_possible_truncation)]
    fn place(
        &mut self,
        index: usize,
        components: &[Component],
        datas: &[&[u8]],
    ) -> EcsResult<Entity> {
        let archetype = &mut self.archetypes[index];
        archetype.ensure_room()?;

        let location = EntityLocation {
            archetype: index as u32,
            row: archetype.len() as u32,
        };
        let handle = self.entities.obtain(location)?;

        if let Err(e) = archetype.push_row(components, datas) {
            // Row never landed; hand the slot back.
            let _ = self.entities.release(handle);
            return Err(e);
        }
        Ok(Entity::from_handle(handle))
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Appends a system. Systems run in registration order.
    ///
    /// # Errors
    ///
    /// - [`EcsError::TooManySystemComponents`] past eight components
    /// - [`EcsError::DuplicateComponent`] if a component repeats
    /// - [`EcsError::UnknownComponent`] for an unregistered component
    pub fn push_system<S: EntitySystem + 'static>(&mut self, system: S) -> EcsResult<()> {
        let components = system.components();
        if components.len() > MAX_SYSTEM_COMPONENT_TYPE_COUNT {
            return Err(EcsError::TooManySystemComponents {
                count: components.len(),
                limit: MAX_SYSTEM_COMPONENT_TYPE_COUNT,
            });
        }

        let mut seen = EntitySignature::EMPTY;
        for &component in components {
            if self.registry.size_of(component).is_none() {
                return Err(EcsError::UnknownComponent(component.index()));
            }
            if seen.contains(component) {
                return Err(EcsError::DuplicateComponent(component.index()));
            }
            seen.insert(component);
        }

        tracing::debug!(
            system = self.systems.len(),
            components = components.len(),
            "system registered"
        );
        self.systems.push(Box::new(system));
        Ok(())
    }

    /// Returns the number of registered systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Runs every system once against the current archetypes.
    ///
    /// Per-run match records are allocated from `frame`; the caller clears
    /// it at the frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Arena`] if `frame` runs out of reservation.
    pub fn run_systems(&mut self, frame: &mut Arena) -> EcsResult<()> {
        system::run_systems(&mut self.systems, &mut self.archetypes, frame)
    }
}

impl Default for EntityContext {
    fn default() -> Self {
        Self::with_valid_config(EcsConfig::default())
    }
}

impl std::fmt::Debug for EntityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityContext")
            .field("components", &self.registry.len())
            .field("archetypes", &self.archetypes.len())
            .field("entities", &self.entities.allocated_count())
            .field("systems", &self.systems.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ArenaError, PoolError};

    fn small_config() -> EcsConfig {
        EcsConfig::default().with_column_reservation(64 * 1024, 0)
    }

    #[test]
    fn test_context_creation() {
        let ctx = EntityContext::new(small_config()).unwrap();
        assert_eq!(ctx.entity_count(), 0);
        assert_eq!(ctx.archetypes().len(), 1);
        assert!(ctx.archetype(0).unwrap().signature().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EcsConfig {
            entity_capacity: 0,
            ..EcsConfig::default()
        };
        assert!(matches!(
            EntityContext::new(config),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_create_entity_without_components() {
        let mut ctx = EntityContext::new(small_config()).unwrap();
        let entity = ctx.create_entity().unwrap();

        assert!(ctx.is_alive(entity));
        assert_eq!(ctx.archetype_of(entity).unwrap(), 0);
        assert_eq!(ctx.archetype(0).unwrap().len(), 1);
    }

    #[test]
    fn test_validation_errors() {
        let mut ctx = EntityContext::new(small_config()).unwrap();
        let a = ctx.register_component("A", 4).unwrap();

        assert_eq!(
            ctx.create_entity_with_components(&[a], &[]),
            Err(EcsError::DataCountMismatch { components: 1, datas: 0 })
        );
        assert_eq!(
            ctx.create_entity_with_components(&[Component::from_index(9)], &[&[0; 4]]),
            Err(EcsError::UnknownComponent(9))
        );
        assert_eq!(
            ctx.create_entity_with_components(&[a, a], &[&[0; 4], &[0; 4]]),
            Err(EcsError::DuplicateComponent(0))
        );
        assert_eq!(
            ctx.create_entity_with_components(&[a], &[&[0; 3]]),
            Err(EcsError::PayloadSize { component: 0, expected: 4, actual: 3 })
        );

        // Nothing leaked into the store.
        assert_eq!(ctx.entity_count(), 0);
        assert_eq!(ctx.archetypes().len(), 1);
    }

    #[test]
    fn test_typed_access() {
        let mut ctx = EntityContext::new(small_config()).unwrap();
        let health = ctx.register_component("Health", 4).unwrap();
        let entity = ctx
            .create_entity_with_components(&[health], &[&100u32.to_ne_bytes()])
            .unwrap();

        assert_eq!(ctx.component::<u32>(entity, health).unwrap(), 100);
        ctx.set_component(entity, health, &75u32).unwrap();
        assert_eq!(ctx.component::<u32>(entity, health).unwrap(), 75);
        assert!(matches!(
            ctx.component::<u64>(entity, health),
            Err(EcsError::PayloadSize { .. })
        ));
    }

    #[test]
    fn test_missing_component() {
        let mut ctx = EntityContext::new(small_config()).unwrap();
        let a = ctx.register_component("A", 4).unwrap();
        let b = ctx.register_component("B", 4).unwrap();
        let entity = ctx.create_entity_with_components(&[a], &[&[1; 4]]).unwrap();

        assert_eq!(
            ctx.component_data(entity, b),
            Err(EcsError::MissingComponent(b.index()))
        );
    }

    #[test]
    fn test_null_entity_rejected() {
        let ctx = EntityContext::new(small_config()).unwrap();
        assert_eq!(
            ctx.archetype_of(Entity::NULL),
            Err(EcsError::Pool(PoolError::NullHandle))
        );
    }

    #[test]
    fn test_entity_pool_exhaustion() {
        let config = EcsConfig {
            entity_capacity: 2,
            ..small_config()
        };
        let mut ctx = EntityContext::new(config).unwrap();
        ctx.create_entity().unwrap();
        ctx.create_entity().unwrap();

        assert_eq!(
            ctx.create_entity(),
            Err(EcsError::Pool(PoolError::Exhausted { capacity: 2 }))
        );
        assert_eq!(ctx.archetype(0).unwrap().len(), 2);
    }

    #[test]
    fn test_column_exhaustion_creates_nothing() {
        let config = EcsConfig::default().with_column_reservation(8, 0);
        let mut ctx = EntityContext::new(config).unwrap();
        let a = ctx.register_component("A", 8).unwrap();

        ctx.create_entity_with_components(&[a], &[&[0; 8]]).unwrap();
        let err = ctx.create_entity_with_components(&[a], &[&[0; 8]]).unwrap_err();

        assert!(matches!(err, EcsError::Arena(ArenaError::ReservationExceeded { .. })));
        assert_eq!(ctx.entity_count(), 1);
    }

    #[test]
    fn test_unreservable_column_is_an_error() {
        let config = EcsConfig::default().with_column_reservation(isize::MAX as usize, 0);
        let mut ctx = EntityContext::new(config).unwrap();
        let a = ctx.register_component("A", 8).unwrap();

        let err = ctx.create_entity_with_components(&[a], &[&[0; 8]]).unwrap_err();

        assert!(matches!(err, EcsError::Arena(ArenaError::ReservationFailed { .. })));
        assert_eq!(ctx.entity_count(), 0);
        assert_eq!(ctx.archetypes().len(), 1);
    }

    #[test]
    fn test_push_system_limits() {
        let mut ctx = EntityContext::new(small_config()).unwrap();
        let components: Vec<Component> = (0..9)
            .map(|i| ctx.register_component(&format!("C{i}"), 4).unwrap())
            .collect();

        let err = ctx
            .push_system(system::FnSystem::new(&components, |_| {}))
            .unwrap_err();
        assert_eq!(
            err,
            EcsError::TooManySystemComponents { count: 9, limit: 8 }
        );

        let dup = [components[0], components[0]];
        assert_eq!(
            ctx.push_system(system::FnSystem::new(&dup, |_| {})),
            Err(EcsError::DuplicateComponent(0))
        );

        ctx.push_system(system::FnSystem::new(&components[..8], |_| {}))
            .unwrap();
        assert_eq!(ctx.system_count(), 1);
    }
}
