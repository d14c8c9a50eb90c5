//! Property-based coverage of the minifier's round-trip and idempotence
//! laws over generated JSON values, complementing the fixed scenarios in
//! `scenarios.rs`.

use proptest::prelude::*;
use tapejson::parser::Parser;

#[derive(Debug, Clone)]
enum Json {
    Null,
    Bool(bool),
    Int(i64),
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

fn arb_json() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::Bool),
        any::<i64>().prop_map(Json::Int),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Json::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6).prop_map(Json::Object),
        ]
    })
}

fn write_json(value: &Json, out: &mut String) {
    match value {
        Json::Null => out.push_str("null"),
        Json::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Json::Int(n) => out.push_str(&n.to_string()),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json(item, out);
            }
            out.push(']');
        }
        Json::Object(fields) => {
            out.push('{');
            for (i, (key, value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                out.push_str(key);
                out.push_str("\":");
                write_json(value, out);
            }
            out.push('}');
        }
    }
}

proptest! {
    #[test]
    fn minify_is_idempotent_over_generated_documents(value in arb_json()) {
        let mut source = String::new();
        write_json(&value, &mut source);

        let mut parser = Parser::new();
        let mut once = Vec::new();
        tapejson::minify::minify(&mut parser, source.as_bytes(), &mut once).unwrap();

        let mut twice = Vec::new();
        tapejson::minify::minify(&mut parser, &once, &mut twice).unwrap();

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn minify_then_reparse_round_trips_scalar_i64_values(n in any::<i64>()) {
        let source = n.to_string();
        let mut parser = Parser::new();
        let mut out = Vec::new();
        tapejson::minify::minify(&mut parser, source.as_bytes(), &mut out).unwrap();
        let doc = parser.parse(&out).unwrap();
        prop_assert_eq!(doc.root().get_i64().unwrap(), n);
    }
}
