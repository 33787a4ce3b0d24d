use std::collections::BTreeMap;

use glam::UVec2;
use questnet::codec::Element;
use questnet::{
    Codec, CodecError, EntityKey, PacketKind, PersonalUpdatePacket, Property, Record, Schema,
    SchemaRegistry, ToRecord, TrimmedRoute, UpdateFrame, UpdatePacket, Value, WireConfig,
};

fn position() -> Schema {
    Schema::builder("position")
        .numerical("id", 2)
        .numerical("x", 1)
        .numerical("y", 1)
        .build()
        .unwrap()
}

fn unit() -> Schema {
    let cell = Schema::builder("cell")
        .numerical("x", 2)
        .numerical("y", 2)
        .build()
        .unwrap();
    Schema::builder("unit")
        .numerical("id", 2)
        .numerical("life", 1)
        .string("name")
        .int_array("inventory", 2)
        .object_array("path", cell.clone())
        .map("allies", cell.clone())
        .stand_alone("home", cell)
        .boolean("alive")
        .boolean("inFight")
        .build()
        .unwrap()
}

fn cell(x: u16, y: u16) -> Record {
    Record::new().with("x", x).with("y", y)
}

fn full_unit() -> Record {
    let mut allies = BTreeMap::new();
    allies.insert(4u64, cell(1, 2));
    allies.insert(300u64, cell(7, 7));
    Record::new()
        .with("id", 12u16)
        .with("life", 80u8)
        .with("name", "Gareth")
        .with("inventory", vec![1u64, 500, 65_535])
        .with("path", vec![cell(1, 1), cell(1, 2), cell(2, 2)])
        .with("allies", allies)
        .with("home", cell(40, 41))
        .with("alive", true)
        .with("inFight", false)
}

#[test]
fn test_end_to_end_example_bytes() {
    let codec = Codec::default();
    let record = Record::new().with("id", 3u16).with("x", 10u8).with("y", 4u8);
    let bytes = codec.encode(&record, &position()).unwrap();

    assert_eq!(bytes.len(), 5);
    assert_eq!(bytes, [0b111, 0x00, 0x03, 0x0A, 0x04]);

    let (decoded, next) = codec.decode(&bytes, 0, &position()).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(next, 5);
}

#[test]
fn test_round_trip_nested_object() {
    let codec = Codec::default();
    let schema = unit();
    let record = full_unit();

    let bytes = codec.encode(&record, &schema).unwrap();
    let (decoded, next) = codec.decode(&bytes, 0, &schema).unwrap();

    assert_eq!(decoded, record);
    assert_eq!(next, bytes.len());
}

#[test]
fn test_round_trip_partial_object() {
    let codec = Codec::default();
    let schema = unit();
    let record = Record::new()
        .with("name", "")
        .with("path", Vec::<Record>::new())
        .with("inFight", true);

    let bytes = codec.encode(&record, &schema).unwrap();
    let (decoded, _) = codec.decode(&bytes, 0, &schema).unwrap();

    assert_eq!(decoded, record);
    assert_eq!(decoded.list("path"), Some(&[][..]));
    assert!(!decoded.contains("alive"));
}

#[test]
fn test_size_matches_encoding() {
    let codec = Codec::default();
    let schema = unit();
    let wide = Codec::new(WireConfig::new(2, 3, 2).unwrap());

    for record in [
        Record::new(),
        full_unit(),
        Record::new().with("alive", false),
        Record::new().with("home", Record::new()),
    ] {
        assert_eq!(
            codec.compute_size(&record, &schema).unwrap(),
            codec.encode(&record, &schema).unwrap().len()
        );
        assert_eq!(
            wide.compute_size(&record, &schema).unwrap(),
            wide.encode(&record, &schema).unwrap().len()
        );
    }
}

#[test]
fn test_decode_follows_offset() {
    let codec = Codec::default();
    let first = Record::new().with("id", 1u16).with("x", 2u8);
    let second = Record::new().with("y", 9u8);

    let mut stream = codec.encode(&first, &position()).unwrap();
    stream.extend(codec.encode(&second, &position()).unwrap());

    let (a, next) = codec.decode(&stream, 0, &position()).unwrap();
    let (b, end) = codec.decode(&stream, next, &position()).unwrap();
    assert_eq!(a, first);
    assert_eq!(b, second);
    assert_eq!(end, stream.len());
}

#[test]
fn test_length_prefix_limit() {
    let codec = Codec::default();
    let schema = Schema::builder("bag")
        .int_array("items", 1)
        .build()
        .unwrap();

    let fits = Record::new().with("items", vec![7u64; 255]);
    let bytes = codec.encode(&fits, &schema).unwrap();
    assert_eq!(bytes.len(), 1 + 1 + 255);
    assert_eq!(bytes[1], 255);

    let overflow = Record::new().with("items", vec![7u64; 256]);
    assert_eq!(
        codec.encode(&overflow, &schema),
        Err(CodecError::TooLong {
            field: "items",
            len: 256
        })
    );
}

#[test]
fn test_map_entry_limit() {
    let codec = Codec::default();
    let entry = Schema::builder("entry").numerical("hp", 1).build().unwrap();
    let schema = Schema::builder("roster").map("units", entry).build().unwrap();
    let roster = |len: u64| {
        let units: BTreeMap<u64, Record> = (0..len)
            .map(|id| (id, Record::new().with("hp", 1u8)))
            .collect();
        Record::new().with("units", units)
    };

    let bytes = codec.encode(&roster(255), &schema).unwrap();
    assert_eq!(bytes[1], 255);
    assert_eq!(bytes.len(), 1 + 1 + 255 * (2 + 1 + 1));

    assert_eq!(
        codec.encode(&roster(256), &schema),
        Err(CodecError::TooLong {
            field: "units",
            len: 256
        })
    );
}

#[test]
fn test_string_length_limit() {
    let codec = Codec::default();
    let schema = Schema::builder("named").string("name").build().unwrap();

    assert!(codec
        .encode(&Record::new().with("name", "a".repeat(255)), &schema)
        .is_ok());
    assert!(matches!(
        codec.encode(&Record::new().with("name", "a".repeat(256)), &schema),
        Err(CodecError::TooLong { .. })
    ));
}

#[test]
fn test_schema_elements() {
    let schema = unit();
    assert_eq!(schema.count_fields(), 9);
    assert!(matches!(schema.arrays()[0].1, Element::Int { bytes: 2 }));
    assert!(matches!(schema.arrays()[1].1, Element::Object(_)));
}

#[test]
fn test_update_frame_round_trip() {
    let codec = Codec::default();
    let schemas = SchemaRegistry::new().unwrap();

    let mut global = UpdatePacket::new();
    global.update_property(EntityKey::monster(5), Property::InFight(true));
    global.update_property(EntityKey::player(2), Property::Position(UVec2::new(30, 12)));
    global.update_route(
        5,
        TrimmedRoute::Monster {
            path: vec![UVec2::new(1, 1), UVec2::new(1, 2)],
            delta: 0,
        },
    );
    global.add_disconnect(9);
    let mut local = PersonalUpdatePacket::new();
    local.add_hp(true, 14, Some(5));
    local.update_life(86);

    let frame = UpdateFrame {
        stamp: 345_678_901,
        latency: 42,
        nb_connected: 3,
        global: Some(&global),
        local: Some(&local),
    };
    let record = frame.to_record();
    let schema = schemas.frame(PacketKind::Update);
    let bytes = codec.encode(&record, schema).unwrap();
    let (decoded, _) = codec.decode(&bytes, 0, schema).unwrap();

    assert_eq!(decoded, record);
    let monsters = decoded.object("global").and_then(|g| g.map("monsters")).unwrap();
    let monster = &monsters[&5];
    assert_eq!(monster.boolean("inFight"), Some(true));
    let path = monster.object("route").and_then(|r| r.list("path")).unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(
        decoded.object("local").and_then(|l| l.uint("life")),
        Some(86)
    );
    assert!(matches!(
        decoded.object("global").and_then(|g| g.get("disconnected")),
        Some(Value::Ints(ids)) if ids == &[9]
    ));
}

#[test]
fn test_wire_width_overflow_is_rejected() {
    let codec = Codec::default();
    let schemas = SchemaRegistry::new().unwrap();

    let mut packet = UpdatePacket::new();
    packet.update_property(EntityKey::player(70_000), Property::Alive(true));
    assert!(matches!(
        codec.encode(&packet.to_record(), schemas.update()),
        Err(CodecError::IdTooWide { key: 70_000, .. })
    ));
}
