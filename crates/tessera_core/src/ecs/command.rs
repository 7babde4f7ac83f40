// command.rs - Deferred structural changes
//
// Every mutating call on the entity manager records one command; `flush`
// consumes them in order. Each command carries the generation of the handle
// it was issued against.

use crate::ecs::{ArchetypeKey, ComponentId, ComponentValue, Entity, EntityDestroyCallback};
use std::fmt;

pub(crate) enum EntityCommand {
    Create {
        index: u32,
        generation: u32,
        key: ArchetypeKey,
        components: Vec<ComponentValue>,
    },
    Destroy {
        index: u32,
        generation: u32,
        callback: Option<Box<dyn EntityDestroyCallback>>,
    },
    SetComponent {
        index: u32,
        generation: u32,
        id: ComponentId,
        value: ComponentValue,
    },
    AddComponent {
        index: u32,
        generation: u32,
        id: ComponentId,
        value: ComponentValue,
    },
    RemoveComponent {
        index: u32,
        generation: u32,
        id: ComponentId,
    },
}

impl EntityCommand {
    /// Handle the command was issued against.
    pub fn entity(&self) -> Entity {
        match *self {
            EntityCommand::Create {
                index, generation, ..
            }
            | EntityCommand::Destroy {
                index, generation, ..
            }
            | EntityCommand::SetComponent {
                index, generation, ..
            }
            | EntityCommand::AddComponent {
                index, generation, ..
            }
            | EntityCommand::RemoveComponent {
                index, generation, ..
            } => Entity::new(index, generation),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityCommand::Create { .. } => "create",
            EntityCommand::Destroy { .. } => "destroy",
            EntityCommand::SetComponent { .. } => "set_component",
            EntityCommand::AddComponent { .. } => "add_component",
            EntityCommand::RemoveComponent { .. } => "remove_component",
        }
    }
}

impl fmt::Debug for EntityCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.entity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_reports_its_issuing_handle() {
        let command = EntityCommand::RemoveComponent {
            index: 4,
            generation: 2,
            id: ComponentId::new(0),
        };
        assert_eq!(command.entity(), Entity::new(4, 2));
        assert_eq!(format!("{command:?}"), "remove_component(4v2)");

        let command = EntityCommand::Create {
            index: 7,
            generation: 3,
            key: ArchetypeKey::new(Vec::new()),
            components: Vec::new(),
        };
        assert_eq!(command.entity().generation(), 3);
    }
}
