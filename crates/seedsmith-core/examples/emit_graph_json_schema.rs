use schemars::schema_for;
use seedsmith_core::GraphDocument;

fn main() {
    let schema = schema_for!(GraphDocument);
    let json = serde_json::to_string_pretty(&schema).expect("serialize json schema");
    println!("{json}");
}
