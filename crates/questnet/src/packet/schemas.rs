use crate::codec::{Schema, SchemaError};

use super::PacketKind;

/// The wire shapes of every message the server sends. Built once at
/// startup and shared by encoder and decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    player: Schema,
    item: Schema,
    monster: Schema,
    update: Schema,
    personal: Schema,
    update_frame: Schema,
    init_frame: Schema,
}

impl SchemaRegistry {
    pub fn new() -> Result<Self, SchemaError> {
        let cell = || Schema::builder("cell").numerical("x", 2).numerical("y", 2).build();

        let player_route = Schema::builder("player_route")
            .numerical("orientation", 1)
            .numerical("delta", 2)
            .stand_alone("end", cell()?)
            .build()?;

        let monster_route = Schema::builder("monster_route")
            .numerical("delta", 2)
            .object_array("path", cell()?)
            .build()?;

        let player = Schema::builder("player")
            .numerical("id", 2)
            .numerical("x", 2)
            .numerical("y", 2)
            .numerical("aoi", 2)
            .numerical("weapon", 2)
            .numerical("armor", 2)
            .numerical("targetID", 2)
            .numerical("lastHitter", 2)
            .string("name")
            .stand_alone("route", player_route)
            .boolean("alive")
            .boolean("inFight")
            .build()?;

        let item = Schema::builder("item")
            .numerical("id", 2)
            .numerical("x", 2)
            .numerical("y", 2)
            .numerical("itemID", 2)
            .boolean("visible")
            .boolean("respawn")
            .boolean("chest")
            .boolean("inChest")
            .boolean("loot")
            .build()?;

        let monster = Schema::builder("monster")
            .numerical("id", 2)
            .numerical("x", 2)
            .numerical("y", 2)
            .numerical("monster", 1)
            .numerical("targetID", 2)
            .numerical("lastHitter", 2)
            .stand_alone("route", monster_route)
            .boolean("alive")
            .boolean("inFight")
            .build()?;

        let update = Schema::builder("update")
            .object_array("newplayers", player.clone())
            .object_array("newitems", item.clone())
            .object_array("newmonsters", monster.clone())
            .int_array("disconnected", 2)
            .map("players", player.clone())
            .map("items", item.clone())
            .map("monsters", monster.clone())
            .build()?;

        let hp = Schema::builder("hp")
            .numerical("hp", 2)
            .numerical("from", 2)
            .boolean("target")
            .build()?;

        let personal = Schema::builder("personal")
            .numerical("x", 2)
            .numerical("y", 2)
            .numerical("life", 2)
            .object_array("hp", hp)
            .int_array("killed", 2)
            .int_array("used", 2)
            .boolean("noPick")
            .build()?;

        let update_frame = Schema::builder("final")
            .numerical("stamp", 4)
            .numerical("latency", 2)
            .numerical("nbconnected", 2)
            .stand_alone("global", update.clone())
            .stand_alone("local", personal.clone())
            .build()?;

        let init_frame = Schema::builder("init")
            .numerical("stamp", 4)
            .numerical("nbconnected", 2)
            .numerical("nbAOIhorizontal", 2)
            .numerical("lastAOIid", 2)
            .stand_alone("player", player.clone())
            .build()?;

        Ok(Self {
            player,
            item,
            monster,
            update,
            personal,
            update_frame,
            init_frame,
        })
    }

    pub fn player(&self) -> &Schema {
        &self.player
    }

    pub fn item(&self) -> &Schema {
        &self.item
    }

    pub fn monster(&self) -> &Schema {
        &self.monster
    }

    /// Shape of an area's pending update.
    pub fn update(&self) -> &Schema {
        &self.update
    }

    pub fn personal(&self) -> &Schema {
        &self.personal
    }

    /// Top-level schema for a packet kind.
    pub fn frame(&self, kind: PacketKind) -> &Schema {
        match kind {
            PacketKind::Init => &self.init_frame,
            PacketKind::Update => &self.update_frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_expected_masks() {
        let registry = SchemaRegistry::new().unwrap();

        assert_eq!(registry.player().count_fields(), 12);
        assert_eq!(registry.player().properties_bytes(), 2);
        assert_eq!(registry.item().properties_bytes(), 2);
        assert_eq!(registry.update().properties_bytes(), 1);
        assert_eq!(registry.frame(PacketKind::Update).name(), "final");
        assert_eq!(registry.frame(PacketKind::Init).name(), "init");
    }
}
