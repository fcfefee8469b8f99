use std::collections::HashMap;

use bevy::prelude::*;

use crate::components::{Alive, Archetype, SimStep};

/// Stable id assigned at spawn, used in event payloads and lookups.
#[derive(Component, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ActorId(pub u64);

/// Owned index of live actors, grouped by archetype. An explicitly inserted
/// resource, so tests can build and inspect their own population.
#[derive(Resource, Default)]
pub struct ActorRegistry {
    next_id: u64,
    ids: HashMap<u64, Entity>,
    by_archetype: HashMap<Archetype, Vec<Entity>>,
}

impl ActorRegistry {
    pub fn allocate(&mut self) -> ActorId {
        self.next_id += 1;
        ActorId(self.next_id)
    }

    pub fn bind(&mut self, id: ActorId, entity: Entity, archetype: Archetype) {
        self.ids.insert(id.0, entity);
        self.by_archetype.entry(archetype).or_default().push(entity);
    }

    pub fn release(&mut self, id: ActorId, entity: Entity, archetype: Archetype) {
        self.ids.remove(&id.0);
        if let Some(group) = self.by_archetype.get_mut(&archetype) {
            group.retain(|e| *e != entity);
        }
    }

    pub fn entity_of(&self, id: ActorId) -> Option<Entity> {
        self.ids.get(&id.0).copied()
    }

    pub fn live(&self, archetype: Archetype) -> &[Entity] {
        self.by_archetype
            .get(&archetype)
            .map_or(&[], |group| group.as_slice())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// End-of-frame cull. Dead entities are collected first and despawned in a
/// second pass through `Commands`, so the live set never changes while it is
/// being iterated.
pub fn cull_dead(
    mut commands: Commands,
    mut registry: ResMut<ActorRegistry>,
    query: Query<(Entity, &ActorId, &Archetype, &Alive)>,
) {
    let dead: Vec<(Entity, ActorId, Archetype)> = query
        .iter()
        .filter(|(_, _, _, alive)| !alive.0)
        .map(|(entity, id, archetype, _)| (entity, *id, *archetype))
        .collect();

    for (entity, id, archetype) in dead {
        registry.release(id, entity, archetype);
        commands.entity(entity).despawn();
    }
}

pub struct RegistryPlugin;

impl Plugin for RegistryPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ActorRegistry::default())
            .add_systems(FixedPostUpdate, cull_dead.in_set(SimStep::Cull));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn registry_groups_actors_by_archetype() {
        let mut registry = ActorRegistry::default();
        let bat = Entity::from_raw(1);
        let mushroom = Entity::from_raw(2);

        let bat_id = registry.allocate();
        registry.bind(bat_id, bat, Archetype::Bat);
        let mushroom_id = registry.allocate();
        registry.bind(mushroom_id, mushroom, Archetype::Mushroom);

        assert_eq!(registry.live(Archetype::Bat), &[bat]);
        assert_eq!(registry.entity_of(mushroom_id), Some(mushroom));
        assert_eq!(registry.len(), 2);
        assert!(registry.live(Archetype::Player).is_empty());
    }

    #[test]
    fn cull_removes_dead_actors_from_world_and_registry() {
        let mut world = World::new();
        let mut registry = ActorRegistry::default();

        let id = registry.allocate();
        let entity = world.spawn((id, Archetype::Bat, Alive(false))).id();
        registry.bind(id, entity, Archetype::Bat);

        let survivor_id = registry.allocate();
        let survivor = world
            .spawn((survivor_id, Archetype::Mushroom, Alive(true)))
            .id();
        registry.bind(survivor_id, survivor, Archetype::Mushroom);

        world.insert_resource(registry);
        world.run_system_once(cull_dead).expect("cull");

        assert!(world.get::<Alive>(entity).is_none());
        assert!(world.get::<Alive>(survivor).is_some());
        let registry = world.resource::<ActorRegistry>();
        assert!(registry.live(Archetype::Bat).is_empty());
        assert_eq!(registry.live(Archetype::Mushroom), &[survivor]);
    }
}
