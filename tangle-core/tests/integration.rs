//! Integration tests running whole graphs through the codec.

use std::collections::HashMap;
use std::sync::mpsc;

use tangle_core::{
    Error, Kind, Mappable, Node, Shared, from_cbor, from_json, materialize, resolve, serialize,
    to_cbor, to_json, wire,
};

/// A parent owning its children, each pointing back at the parent.
#[derive(Debug, Default, Mappable)]
#[allow(non_snake_case)]
struct Parent {
    pub Name: String,
    pub Children: Vec<Shared<Child>>,
}

#[derive(Debug, Default, Mappable)]
#[allow(non_snake_case)]
struct Child {
    pub Name: String,
    pub Parent: Option<Shared<Parent>>,
}

#[derive(Debug, Default, Mappable)]
struct SelfRef {
    #[tangle(rename = "Name")]
    pub name: String,
    #[tangle(rename = "Self")]
    pub me: Option<Shared<SelfRef>>,
}

#[derive(Debug, Default, Mappable)]
struct Person {
    #[tangle(rename = "name")]
    pub name: String,
    #[tangle(rename = "parent")]
    pub parent: Option<Shared<Person>>,
    #[tangle(rename = "children")]
    pub children: Vec<Shared<Person>>,
}

#[derive(Debug, Default, Mappable)]
struct Family {
    pub name: String,
    pub sibling: Option<Shared<Family>>,
    pub cousins: Vec<Shared<Family>>,
}

#[derive(Debug, Default, Mappable)]
#[allow(non_snake_case)]
struct Relative {
    pub Name: String,
    pub Sibling: Option<Shared<Relative>>,
    pub Parent: Option<Shared<Relative>>,
    pub Children: Vec<Shared<Relative>>,
}

#[derive(Debug, Default, PartialEq, Mappable)]
struct AllTypes {
    pub flag: bool,
    pub small: i8,
    pub signed: i64,
    pub unsigned: u32,
    pub ratio: f64,
    pub items: Vec<i32>,
    pub table: HashMap<String, u16>,
    pub label: String,
    pub boxed: Option<Box<String>>,
}

#[derive(Debug, Default, PartialEq, Mappable)]
enum Mood {
    #[default]
    Calm,
    #[tangle(rename = "in-a-hurry")]
    Hurried,
}

#[derive(Debug, Default, PartialEq, Mappable)]
struct Annotated {
    pub mood: Mood,
    #[tangle(skip)]
    pub cache: u64,
}

#[derive(Debug, Default, PartialEq, Mappable)]
struct Account {
    pub user: String,
    secret: String,
}

#[derive(Debug, Default, Mappable)]
struct PrivateChannel {
    pub name: String,
    events: Option<mpsc::Sender<u8>>,
}

#[derive(Debug, Default, Mappable)]
struct WithChannel {
    pub name: String,
    #[tangle(skip)]
    pub events: Option<mpsc::Sender<u8>>,
}

fn named(fields: impl IntoIterator<Item = (&'static str, Node)>) -> Vec<(String, Node)> {
    fields
        .into_iter()
        .map(|(key, node)| (key.to_string(), node))
        .collect()
}

#[test]
fn parent_child_ref_ids() {
    let patrik = Shared::new(Parent {
        Name: "Patrik".into(),
        Children: Vec::new(),
    });
    let valentine = Shared::new(Child {
        Name: "Valentine".into(),
        Parent: Some(patrik.clone()),
    });
    patrik.write().Children.push(valentine.clone());

    let node = serialize(&patrik).unwrap();
    let expected = Node::pointer(
        1,
        Some(Node::structure(
            2,
            named([
                ("Name", Node::scalar(3, "Patrik")),
                (
                    "Children",
                    Node::sequence(
                        4,
                        vec![Node::pointer(
                            5,
                            Some(Node::structure(
                                6,
                                named([
                                    ("Name", Node::scalar(7, "Valentine")),
                                    ("Parent", Node::reference(8, 1)),
                                ]),
                            )),
                        )],
                    ),
                ),
            ]),
        )),
    );
    assert_eq!(node, expected);

    valentine.write().Parent = None;
}

#[test]
fn parent_without_children() {
    let patrik = Shared::new(Parent {
        Name: "Patrik".into(),
        Children: Vec::new(),
    });
    let node = serialize(&patrik).unwrap();
    assert_eq!(
        node,
        Node::pointer(
            1,
            Some(Node::structure(
                2,
                named([
                    ("Name", Node::scalar(3, "Patrik")),
                    ("Children", Node::sequence(4, Vec::new())),
                ]),
            )),
        )
    );
}

#[test]
fn self_reference_closes() {
    let klark = Shared::new(SelfRef {
        name: "Klark".into(),
        me: None,
    });
    klark.write().me = Some(klark.clone());

    let node = serialize(&klark).unwrap();
    assert_eq!(
        node,
        Node::pointer(
            1,
            Some(Node::structure(
                2,
                named([
                    ("Name", Node::scalar(3, "Klark")),
                    ("Self", Node::reference(4, 1)),
                ]),
            )),
        )
    );

    let back: Shared<SelfRef> = from_json(&to_json(&klark).unwrap()).unwrap();
    let me = back.read().me.clone().unwrap();
    assert!(me.ptr_eq(&back));
    assert_eq!(me.read().name, "Klark");

    klark.write().me = None;
    back.write().me = None;
}

#[test]
fn arthur_ford_trillian() {
    let arthur = Shared::new(Person {
        name: "Arthur".into(),
        ..Default::default()
    });
    for name in ["Ford", "Trillian"] {
        let child = Shared::new(Person {
            name: name.into(),
            parent: Some(arthur.clone()),
            children: Vec::new(),
        });
        arthur.write().children.push(child);
    }

    let bytes = to_json(&arthur).unwrap();
    let person: Shared<Person> = from_json(&bytes).unwrap();

    let root = person.read();
    assert_eq!(root.name, "Arthur");
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].read().name, "Ford");
    assert_eq!(root.children[1].read().name, "Trillian");
    for child in &root.children {
        let parent = child.read().parent.clone().unwrap();
        assert!(parent.ptr_eq(&person));
        assert_eq!(parent.read().name, "Arthur");
    }
    drop(root);

    for graph in [&arthur, &person] {
        for child in &graph.read().children {
            child.write().parent = None;
        }
    }
}

#[test]
fn martin_kevin_back_reference() {
    // Kevin's children point back at the root by reference.
    let tree = Node::pointer(
        1,
        Some(Node::structure(
            2,
            named([
                ("name", Node::scalar(3, "Martin")),
                (
                    "parent",
                    Node::pointer(
                        4,
                        Some(Node::structure(
                            5,
                            named([
                                ("name", Node::scalar(6, "Kevin")),
                                ("children", Node::sequence(7, vec![Node::reference(8, 1)])),
                            ]),
                        )),
                    ),
                ),
            ]),
        )),
    );

    let martin: Shared<Person> = materialize(&resolve(tree)).unwrap();
    let kevin = martin.read().parent.clone().unwrap();
    assert_eq!(kevin.read().name, "Kevin");
    assert!(kevin.read().parent.is_none());
    assert!(kevin.read().children[0].ptr_eq(&martin));

    kevin.write().children.clear();
}

#[test]
fn family_forward_and_cross_links() {
    let mike = Shared::new(Family {
        name: "Mike".into(),
        ..Default::default()
    });
    let frank = Shared::new(Family {
        name: "Frank".into(),
        ..Default::default()
    });
    let zak = Shared::new(Family {
        name: "Zak".into(),
        ..Default::default()
    });
    mike.write().sibling = Some(frank.clone());
    frank.write().sibling = Some(mike.clone());
    zak.write().cousins = vec![mike.clone(), frank.clone()];
    mike.write().cousins = vec![zak.clone()];

    let roots = vec![zak.clone(), mike.clone(), frank.clone()];
    let bytes = to_cbor(&roots).unwrap();
    let back: Vec<Shared<Family>> = from_cbor(&bytes).unwrap();

    let (zak2, mike2, frank2) = (&back[0], &back[1], &back[2]);
    assert_eq!(zak2.read().name, "Zak");
    assert!(zak2.read().cousins[0].ptr_eq(mike2));
    assert!(zak2.read().cousins[1].ptr_eq(frank2));
    assert!(mike2.read().sibling.clone().unwrap().ptr_eq(frank2));
    assert!(frank2.read().sibling.clone().unwrap().ptr_eq(mike2));
    assert!(mike2.read().cousins[0].ptr_eq(zak2));

    for graph in [&roots, &back] {
        for member in graph {
            let mut member = member.write();
            member.sibling = None;
            member.cousins.clear();
        }
    }
}

#[test]
fn mike_frank_zak_materialize_as_one_graph() {
    let zak = Node::pointer(
        10,
        Some(Node::structure(
            11,
            named([
                ("Name", Node::scalar(12, "Zak")),
                ("Sibling", Node::reference(13, 1)),
                ("Parent", Node::reference(14, 5)),
            ]),
        )),
    );
    let frank = Node::pointer(
        5,
        Some(Node::structure(
            6,
            named([
                ("Name", Node::scalar(7, "Frank")),
                ("Children", Node::sequence(8, vec![Node::reference(9, 1), zak])),
            ]),
        )),
    );
    let tree = Node::pointer(
        1,
        Some(Node::structure(
            2,
            named([
                ("Sibling", Node::reference(3, 10)),
                ("Name", Node::scalar(4, "Mike")),
                ("Parent", frank),
            ]),
        )),
    );
    let json = wire::encode_json(&tree).unwrap();

    let resolved: Shared<Relative> = materialize(&resolve(tree)).unwrap();
    let decoded: Shared<Relative> = from_json(&json).unwrap();

    for mike in [resolved, decoded] {
        let frank = mike.read().Parent.clone().unwrap();
        let zak = frank.read().Children[1].clone();
        assert_eq!(mike.read().Name, "Mike");
        assert_eq!(frank.read().Name, "Frank");
        assert_eq!(zak.read().Name, "Zak");

        assert!(mike.read().Sibling.clone().unwrap().ptr_eq(&zak));
        assert!(frank.read().Children[0].ptr_eq(&mike));
        assert!(zak.read().Sibling.clone().unwrap().ptr_eq(&mike));
        assert!(zak.read().Parent.clone().unwrap().ptr_eq(&frank));
        assert_eq!(frank.read().Children.len(), 2);

        for relative in [&mike, &frank, &zak] {
            let mut relative = relative.write();
            relative.Sibling = None;
            relative.Parent = None;
            relative.Children.clear();
        }
    }
}

#[test]
fn all_types_round_trip() {
    let value = AllTypes {
        flag: true,
        small: -4,
        signed: i64::MIN,
        unsigned: 42,
        ratio: 42.42,
        items: vec![1, 2],
        table: [("1".to_string(), 1u16), ("2".to_string(), 2u16)]
            .into_iter()
            .collect(),
        label: "string".into(),
        boxed: Some(Box::new("xxx".into())),
    };

    let json: AllTypes = from_json(&to_json(&value).unwrap()).unwrap();
    assert_eq!(json, value);
    let cbor: AllTypes = from_cbor(&to_cbor(&value).unwrap()).unwrap();
    assert_eq!(cbor, value);

    let empty = AllTypes::default();
    let back: AllTypes = from_json(&to_json(&empty).unwrap()).unwrap();
    assert_eq!(back, empty);
}

#[test]
fn null_containers_decode_empty() {
    let doc = br#"{"refid":1,"kind":"struct","value":{
        "items":{"refid":2,"kind":"slice","value":null},
        "table":{"refid":3,"kind":"map","value":null},
        "boxed":{"refid":4,"kind":"ptr","value":null}
    }}"#;
    let value: AllTypes = from_json(doc).unwrap();
    assert_eq!(value, AllTypes::default());
}

#[test]
fn missing_fields_default_and_extra_fields_ignored() {
    let doc = br#"{"refid":1,"kind":"struct","value":{
        "label":{"refid":2,"kind":"string","value":"kept"},
        "unknown":{"refid":3,"kind":"bool","value":true}
    }}"#;
    let value: AllTypes = from_json(doc).unwrap();
    assert_eq!(value.label, "kept");
    assert_eq!(value.unsigned, 0);
}

#[test]
fn rename_and_skip() {
    let value = Annotated {
        mood: Mood::Hurried,
        cache: 99,
    };
    let node = serialize(&value).unwrap();
    assert_eq!(
        node,
        Node::structure(1, named([("mood", Node::scalar(2, "in-a-hurry"))]))
    );

    let back: Annotated = materialize(&resolve(node)).unwrap();
    assert_eq!(
        back,
        Annotated {
            mood: Mood::Hurried,
            cache: 0,
        }
    );
}

#[test]
fn private_fields_stay_out_of_the_tree() {
    let value = Account {
        user: "arthur".into(),
        secret: "hunter2".into(),
    };
    let node = serialize(&value).unwrap();
    assert_eq!(
        node,
        Node::structure(1, named([("user", Node::scalar(2, "arthur"))]))
    );
    let json = String::from_utf8(to_json(&value).unwrap()).unwrap();
    assert!(!json.contains("secret"));
    assert!(!json.contains("hunter2"));

    let doc = br#"{"refid":1,"kind":"struct","value":{
        "user":{"refid":2,"kind":"string","value":"ford"},
        "secret":{"refid":3,"kind":"string","value":"towel"}
    }}"#;
    let back: Account = from_json(doc).unwrap();
    assert_eq!(
        back,
        Account {
            user: "ford".into(),
            secret: String::new(),
        }
    );
    assert!(back.secret.is_empty());

    let (sender, _receiver) = mpsc::channel();
    let with_channel = PrivateChannel {
        name: "events".into(),
        events: Some(sender),
    };
    assert!(with_channel.events.is_some());
    assert!(matches!(
        serialize(&with_channel),
        Err(Error::UnsupportedKind("chan"))
    ));
}

#[test]
fn unknown_enum_variant_fails() {
    let node = Node::structure(1, named([("mood", Node::scalar(2, "Angry"))]));
    let err = materialize::<Annotated>(&resolve(node)).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidValue {
            kind: Kind::String,
            ..
        }
    ));
}

#[test]
fn skipped_unsupported_field_still_fails() {
    let (tx, _rx) = mpsc::channel();
    let value = WithChannel {
        name: "events".into(),
        events: Some(tx),
    };
    assert!(matches!(serialize(&value), Err(Error::UnsupportedKind("chan"))));

    let idle = WithChannel {
        name: "idle".into(),
        events: None,
    };
    assert!(matches!(serialize(&idle), Err(Error::UnsupportedKind("chan"))));
}

#[test]
fn unsupported_root_fails() {
    let (tx, _rx) = mpsc::channel::<u8>();
    assert!(matches!(to_json(&tx), Err(Error::UnsupportedKind("chan"))));
}

#[test]
fn unresolved_reference_is_reported() {
    let doc = br#"{"refid":1,"kind":"slice","value":[
        {"refid":2,"kind":"ref","value":9}
    ]}"#;
    let tree = resolve(wire::decode_json(doc).unwrap());
    assert!(tree.has_unresolved());
    assert_eq!(tree.unresolved(), vec![9]);

    let err = materialize::<Vec<Shared<u8>>>(&tree).unwrap_err();
    assert!(matches!(err, Error::UnresolvedReference(9)));
}

#[test]
fn kind_mismatch_names_both_kinds() {
    let tree = resolve(Node::pointer(1, Some(Node::scalar(2, "0"))));
    let err = materialize::<Option<i64>>(&tree).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unexpected kind (expected: int64, got: string)"
    );
}

#[test]
fn value_mismatch_is_a_decode_error() {
    let doc = br#"{"refid":1,"kind":"ptr","value":{"refid":2,"kind":"float64","value":"xxx"}}"#;
    let err = from_json::<Option<f64>>(doc).unwrap_err();
    assert!(err.to_string().contains(r#"invalid value string("xxx") for kind "float64""#));
}

#[test]
fn references_reuse_identity_within_one_call_only() {
    let shared = Shared::new(1u8);
    let first = serialize(&vec![shared.clone(), shared.clone()]).unwrap();
    let second = serialize(&vec![shared.clone(), shared]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn empty_document_is_no_data() {
    let node = wire::decode_json(b"").unwrap();
    assert!(node.is_empty());
    let tree = resolve(node);
    assert!(tree.is_empty());
    assert_eq!(materialize::<Option<u8>>(&tree).unwrap(), None);
}
