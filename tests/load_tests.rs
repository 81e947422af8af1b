use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use flate2::write::{GzEncoder, ZlibEncoder};
use pretty_assertions::assert_eq;
use tmx_graph::{
    Anomaly, LoadOptions, Loader, MapError, MemoryReader, ObjectRef, ObjectShape, PropertyValue,
};

const LEVEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" tiledversion="1.10.2" orientation="orthogonal" renderorder="right-down"
     width="3" height="2" tilewidth="16" tileheight="16" infinite="0" nextlayerid="3" nextobjectid="3">
 <properties>
  <property name="music" type="file" value="../audio/theme.ogg"/>
 </properties>
 <tileset firstgid="1" source="../tilesets/Terrain.tsx"/>
 <layer id="1" name="ground" width="3" height="2">
  <data encoding="csv">
1,2,0,
2147483652,0,1
</data>
 </layer>
 <objectgroup id="2" name="things">
  <object id="1" name="door" type="door" x="16" y="0" width="16" height="16">
   <properties>
    <property name="target" type="object" value="2"/>
   </properties>
  </object>
  <object id="2" name="spawn" gid="3" x="32" y="32"/>
 </objectgroup>
</map>
"#;

const TERRAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset version="1.10" name="terrain" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <image source="terrain.png" width="32" height="32"/>
 <properties>
  <property name="biome" value="grass"/>
 </properties>
 <tile id="1" type="wall">
  <properties>
   <property name="solid" type="bool" value="true"/>
  </properties>
 </tile>
</tileset>
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn memory_loader(files: &[(&str, &str)]) -> Loader {
    let reader = files
        .iter()
        .fold(MemoryReader::new(), |r, (path, text)| r.with(path, *text));
    Loader::with_reader(reader)
}

fn inline_map(layer: &str) -> String {
    format!(
        r#"<map width="2" height="2" tilewidth="8" tileheight="8">
            <tileset firstgid="1" name="t" tilewidth="8" tileheight="8" tilecount="4" columns="2"/>
            {layer}
        </map>"#
    )
}

fn le_bytes(cells: &[u32]) -> Vec<u8> {
    cells.iter().flat_map(|c| c.to_le_bytes()).collect()
}

#[test]
fn external_tileset_resolves_relative_to_the_map() {
    init_tracing();
    let loader = memory_loader(&[("maps/level.tmx", LEVEL), ("tilesets/terrain.tsx", TERRAIN)]);
    let map = loader.load("maps/level.tmx").unwrap();

    assert_eq!(map.version, "1.10");
    assert_eq!(map.tiled_version.as_deref(), Some("1.10.2"));
    assert_eq!((map.width, map.height), (3, 2));
    assert_eq!(map.pixel_width(), 48);
    assert!(map.anomalies.is_empty());

    let ts = &map.tilesets[0];
    assert_eq!(ts.name, "terrain");
    assert_eq!(ts.first_gid, 1);
    assert_eq!(ts.source.as_deref(), Some(Path::new("tilesets/Terrain.tsx")));
    assert_eq!(
        ts.image.as_ref().map(|i| i.source.clone()),
        Some(PathBuf::from("tilesets/terrain.png"))
    );
    assert_eq!(ts.tiles.len(), 4);
    assert_eq!(ts.tiles[1].class, "wall");

    let props = map.tile_properties(2).unwrap();
    assert_eq!(props.get_string("biome"), Some("grass"));
    assert_eq!(props.get_bool("solid"), Some(true));
    assert_eq!(map.tile_properties(1).unwrap().get_bool("solid"), None);

    assert_eq!(
        map.properties.get_file("music"),
        Some(Path::new("maps/../audio/theme.ogg"))
    );
}

#[test]
fn csv_cells_carry_tileset_and_flip() {
    let loader = memory_loader(&[("maps/level.tmx", LEVEL), ("tilesets/terrain.tsx", TERRAIN)]);
    let map = loader.load("maps/level.tmx").unwrap();
    let ground = map.layer_by_name("ground").unwrap().as_tile_layer().unwrap();

    assert_eq!(ground.get(0, 0).map(|t| t.local_id), Some(0));
    assert_eq!(ground.get(1, 0).map(|t| t.gid), Some(2));
    assert_eq!(ground.get(2, 0), None);

    let flipped = ground.get(0, 1).unwrap();
    assert_eq!(flipped.gid, 4);
    assert_eq!(flipped.local_id, 3);
    assert!(flipped.flip.horizontal);
    assert!(!flipped.flip.vertical && !flipped.flip.diagonal);

    assert_eq!(ground.tiles().count(), 4);
    // out of range reads as empty
    assert_eq!(ground.get(-1, 0), None);
    assert_eq!(ground.get(3, 0), None);
}

#[test]
fn object_references_bind_to_their_targets() {
    let loader = memory_loader(&[("maps/level.tmx", LEVEL), ("tilesets/terrain.tsx", TERRAIN)]);
    let map = loader.load("maps/level.tmx").unwrap();

    let door = map.object_by_id(1).unwrap();
    assert_eq!(door.class, "door");
    let target = door.properties.get_object("target").unwrap();
    assert_eq!(target.id(), Some(2));
    let spawn = map.referenced(target).unwrap();
    assert_eq!(spawn.name, "spawn");

    // tile objects take the tileset's tile size when none is given
    assert_eq!((spawn.width, spawn.height), (16.0, 16.0));
    match &spawn.shape {
        ObjectShape::Tile(tile) => assert_eq!(tile.local_id, 2),
        other => panic!("expected a tile object, got {other:?}"),
    }
}

#[test]
fn missing_external_tileset_is_an_io_error() {
    let loader = memory_loader(&[("maps/level.tmx", LEVEL)]);
    match loader.load("maps/level.tmx").unwrap_err() {
        MapError::Io { path, .. } => assert_eq!(path, PathBuf::from("tilesets/Terrain.tsx")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn base64_payloads_with_every_compression() {
    let cells = [1u32, 2, 0x4000_0003, 0];
    let raw = le_bytes(&cells);

    let mut zlib = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    zlib.write_all(&raw).unwrap();
    let mut gzip = GzEncoder::new(Vec::new(), flate2::Compression::default());
    gzip.write_all(&raw).unwrap();

    let b64 = base64::engine::general_purpose::STANDARD;
    let payloads = [
        ("", b64.encode(&raw)),
        ("zlib", b64.encode(zlib.finish().unwrap())),
        ("gzip", b64.encode(gzip.finish().unwrap())),
    ];

    for (compression, payload) in payloads {
        let doc = inline_map(&format!(
            r#"<layer name="packed" width="2" height="2">
                 <data encoding="base64" compression="{compression}">
                   {payload}
                 </data>
               </layer>"#
        ));
        let map = Loader::with_reader(MemoryReader::new())
            .load_from_str(&doc, "packed.tmx")
            .unwrap();
        let layer = map.layers[0].as_tile_layer().unwrap();
        assert_eq!(layer.get(0, 0).map(|t| t.gid), Some(1), "{compression}");
        assert_eq!(layer.get(1, 0).map(|t| t.gid), Some(2), "{compression}");
        let third = layer.get(0, 1).unwrap();
        assert_eq!(third.gid, 3);
        assert!(third.flip.vertical);
        assert_eq!(layer.get(1, 1), None);
    }
}

#[test]
fn infinite_layers_read_through_chunks() {
    let doc = r#"<map width="4" height="4" tilewidth="8" tileheight="8" infinite="1">
        <tileset firstgid="1" name="t" tilewidth="8" tileheight="8" tilecount="4" columns="2"/>
        <layer name="inf" width="4" height="4">
          <data encoding="csv">
            <chunk x="-2" y="0" width="2" height="2">1,0,0,2</chunk>
            <chunk x="0" y="0" width="2" height="2">3,0,0,4</chunk>
          </data>
        </layer>
    </map>"#;
    let map = Loader::with_reader(MemoryReader::new())
        .load_from_str(doc, "inf.tmx")
        .unwrap();
    assert!(map.infinite);

    let layer = map.layers[0].as_tile_layer().unwrap();
    assert!(layer.is_infinite());
    assert_eq!(layer.get(-2, 0).map(|t| t.local_id), Some(0));
    assert_eq!(layer.get(-1, 1).map(|t| t.local_id), Some(1));
    assert_eq!(layer.get(0, 0).map(|t| t.local_id), Some(2));
    assert_eq!(layer.get(1, 1).map(|t| t.local_id), Some(3));
    assert_eq!(layer.get(-1, 0), None);
    assert_eq!(layer.get(5, 5), None);
    assert_eq!(layer.get(-3, 0), None);
    assert_eq!(layer.tiles().count(), 4);
}

#[test]
fn infinite_json_layer_without_chunks_is_empty() {
    let doc = r#"{
      "type": "map", "orientation": "orthogonal", "width": 4, "height": 4,
      "tilewidth": 8, "tileheight": 8, "infinite": true, "tilesets": [],
      "layers": [{"id": 1, "type": "tilelayer", "name": "fresh", "width": 4, "height": 4,
                  "opacity": 1, "visible": true, "x": 0, "y": 0, "chunks": []}]
    }"#;
    let map = Loader::with_reader(MemoryReader::new())
        .load_from_str(doc, "fresh.tmj")
        .unwrap();
    assert!(map.infinite);

    let layer = map.layers[0].as_tile_layer().unwrap();
    assert!(layer.is_infinite());
    assert_eq!(layer.tiles().count(), 0);
    assert_eq!(layer.get(0, 0), None);
}

#[test]
fn unsupported_data_formats_fail() {
    let doc = inline_map(
        r#"<layer name="l" width="2" height="2"><data encoding="base64" compression="lzma">AAAA</data></layer>"#,
    );
    match Loader::with_reader(MemoryReader::new()).load_from_str(&doc, "l.tmx") {
        Err(MapError::UnsupportedCompression { compression, .. }) => assert_eq!(compression, "lzma"),
        other => panic!("unexpected result {other:?}"),
    }

    let doc = inline_map(r#"<layer name="l" width="2" height="2"><data encoding="hex">00</data></layer>"#);
    assert!(matches!(
        Loader::with_reader(MemoryReader::new()).load_from_str(&doc, "l.tmx"),
        Err(MapError::UnsupportedEncoding { ref encoding, .. }) if encoding == "hex"
    ));

    let doc = inline_map(
        r#"<layer name="l" width="2" height="2"><data encoding="csv" compression="zlib">1,0,0,0</data></layer>"#,
    );
    assert!(matches!(
        Loader::with_reader(MemoryReader::new()).load_from_str(&doc, "l.tmx"),
        Err(MapError::UnsupportedCompression { .. })
    ));
}

#[test]
fn short_payload_is_malformed_tile_data() {
    let doc = inline_map(r#"<layer name="short" width="2" height="2"><data encoding="csv">1,2,3</data></layer>"#);
    match Loader::with_reader(MemoryReader::new()).load_from_str(&doc, "short.tmx") {
        Err(MapError::MalformedTileData { element, .. }) => {
            assert_eq!(element, "map/layer[short]/data")
        }
        other => panic!("unexpected result {other:?}"),
    }
}

const DANGLING: &str = r#"<map width="1" height="1" tilewidth="8" tileheight="8">
  <objectgroup name="things">
    <object id="1" name="lever" x="0" y="0">
      <properties>
        <property name="target" type="object" value="99"/>
        <property name="nothing" type="object" value="0"/>
        <property name="strength" type="int" value="lots"/>
      </properties>
    </object>
  </objectgroup>
</map>"#;

#[test]
fn recoverable_defects_become_anomalies() {
    let map = Loader::with_reader(MemoryReader::new())
        .load_from_str(DANGLING, "dangling.tmx")
        .unwrap();
    let lever = map.object_by_id(1).unwrap();
    assert_eq!(
        lever.properties.get_object("target"),
        Some(&ObjectRef::Unresolved(99))
    );
    assert_eq!(lever.properties.get_object("nothing"), Some(&ObjectRef::None));
    assert_eq!(lever.properties.get("strength"), Some(&PropertyValue::Int(0)));

    assert_eq!(map.anomalies.len(), 2);
    assert!(map.anomalies.contains(&Anomaly::DanglingObjectReference {
        element: "map/layer[things]/object[1]".into(),
        property: "target".into(),
        id: 99,
    }));
    assert!(map.anomalies.iter().any(|a| matches!(
        a,
        Anomaly::PropertyTypeMismatch { property, value, .. } if property == "strength" && value == "lots"
    )));
}

#[test]
fn strict_loaders_reject_anomalies() {
    let loader = Loader::with_reader(MemoryReader::new()).with_options(LoadOptions { strict: true });
    match loader.load_from_str(DANGLING, "dangling.tmx") {
        Err(MapError::Anomaly { path, .. }) => assert_eq!(path, PathBuf::from("dangling.tmx")),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn json_documents_load_like_xml() {
    let map_json = r#"{
      "type": "map", "version": "1.10", "orientation": "orthogonal", "renderorder": "right-down",
      "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16, "infinite": false,
      "nextlayerid": 3, "nextobjectid": 3,
      "tilesets": [{"firstgid": 1, "source": "terrain.tsj"}],
      "layers": [
        {"id": 1, "type": "tilelayer", "name": "ground", "width": 2, "height": 1,
         "opacity": 1, "visible": true, "x": 0, "y": 0, "data": [2, 1]},
        {"id": 2, "type": "objectgroup", "name": "things", "draworder": "topdown",
         "opacity": 0.5, "visible": true, "x": 0, "y": 0,
         "objects": [
           {"id": 1, "name": "chest", "type": "loot", "x": 4, "y": 8, "width": 0, "height": 0,
            "rotation": 0, "visible": true, "point": true,
            "properties": [{"name": "gold", "type": "int", "value": 12}]},
           {"id": 2, "name": "zone", "type": "", "x": 0, "y": 0, "width": 0, "height": 0,
            "rotation": 0, "visible": true,
            "polygon": [{"x": 0, "y": 0}, {"x": 16, "y": 0}, {"x": 16, "y": 16}]}
         ]}
      ]
    }"#;
    let tileset_json = r#"{
      "type": "tileset", "name": "terrain", "tilewidth": 16, "tileheight": 16,
      "tilecount": 2, "columns": 2, "image": "terrain.png", "imagewidth": 32, "imageheight": 16,
      "tiles": [{"id": 1, "type": "water", "properties": [{"name": "depth", "type": "float", "value": 2.5}]}]
    }"#;
    let loader = memory_loader(&[("world/level.tmj", map_json), ("world/terrain.tsj", tileset_json)]);
    let map = loader.load("world/level.tmj").unwrap();

    assert_eq!(map.tilesets[0].name, "terrain");
    assert_eq!(
        map.tilesets[0].image.as_ref().map(|i| i.source.clone()),
        Some(PathBuf::from("world/terrain.png"))
    );
    let ground = map.layers[0].as_tile_layer().unwrap();
    assert_eq!(ground.get(0, 0).map(|t| t.local_id), Some(1));
    assert_eq!(map.tile(2).map(|t| t.class.as_str()), Some("water"));
    assert_eq!(map.tile_properties(2).unwrap().get_f64("depth"), Some(2.5));

    let things = map.layers[1].as_object_group().unwrap();
    assert!((things.info.opacity - 0.5).abs() < 1e-6);
    let chest = things.by_name("chest").unwrap();
    assert_eq!(chest.shape, ObjectShape::Point);
    assert_eq!(chest.class, "loot");
    assert_eq!(chest.properties.get_i64("gold"), Some(12));
    match &things.by_name("zone").unwrap().shape {
        ObjectShape::Polygon(points) => assert_eq!(points.len(), 3),
        other => panic!("expected polygon, got {other:?}"),
    }
}

#[test]
fn filesystem_reader_matches_names_case_insensitively() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("Level.tmx"),
        LEVEL.replace("../tilesets/Terrain.tsx", "TERRAIN.tsx"),
    )?;
    std::fs::write(dir.path().join("terrain.tsx"), TERRAIN)?;

    let map = tmx_graph::load(dir.path().join("level.tmx"))?;
    assert_eq!(map.tilesets[0].name, "terrain");
    assert_eq!(
        map.tilesets[0].image.as_ref().map(|i| i.source.clone()),
        Some(dir.path().join("terrain.png"))
    );

    let err = tmx_graph::load(dir.path().join("missing.tmx")).unwrap_err();
    assert!(matches!(err, MapError::Io { .. }));
    Ok(())
}

#[test]
fn project_types_fill_class_and_enum_properties() {
    let project = r#"{
      "propertyTypes": [
        {"id": 1, "name": "Stats", "type": "class", "useAs": ["property"],
         "members": [
           {"name": "hp", "type": "int", "value": 10},
           {"name": "speed", "type": "float", "value": 1.5}
         ]},
        {"id": 2, "name": "Faction", "type": "enum", "storageType": "string",
         "values": ["neutral", "hostile"], "valuesAsFlags": false}
      ]
    }"#;
    let level = r#"<map width="1" height="1" tilewidth="8" tileheight="8">
      <objectgroup name="actors">
        <object id="1" name="orc" type="enemy" x="0" y="0" width="8" height="8">
          <properties>
            <property name="stats" type="class" propertytype="Stats">
              <properties><property name="hp" value="25"/></properties>
            </property>
            <property name="faction" propertytype="Faction" value="hostile"/>
            <property name="mood" propertytype="Faction" value="grumpy"/>
          </properties>
        </object>
      </objectgroup>
    </map>"#;
    let mut loader = memory_loader(&[("game.tiled-project", project), ("level.tmx", level)]);
    loader.load_project("game.tiled-project").unwrap();
    assert!(loader.property_types().class("Stats").is_some());

    let map = loader.load("level.tmx").unwrap();
    let orc = map.object_by_id(1).unwrap();
    let stats = orc.properties.get_class("stats").unwrap();
    assert_eq!(stats.get("hp"), Some(&PropertyValue::Int(25)));
    assert_eq!(stats.get("speed"), Some(&PropertyValue::Float(1.5)));
    assert_eq!(
        orc.properties.get("faction"),
        Some(&PropertyValue::Enum {
            property_type: "Faction".into(),
            value: "hostile".into()
        })
    );
    assert_eq!(map.anomalies.len(), 1);
    assert!(matches!(
        &map.anomalies[0],
        Anomaly::PropertyTypeMismatch { property, .. } if property == "mood"
    ));
}
