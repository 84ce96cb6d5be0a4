#![no_main]

use ferrous_inject::{ClassifierRef, QualifierTag, TypeRef};
use libfuzzer_sys::fuzz_target;

// Builds nested `Pair<A, B>` types from the input and checks that unique
// names stay within the limit and are stable.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let first = ClassifierRef::type_parameter("app.Pair.A");
    let second = ClassifierRef::type_parameter("app.Pair.B");
    let pair = ClassifierRef::builder("app.Pair").type_parameters(vec![first, second]).build();
    let leaf = ClassifierRef::class("app.Leaf");

    let mut stack: Vec<TypeRef> = Vec::new();
    for byte in data.iter().take(256) {
        match byte % 4 {
            0 => stack.push(TypeRef::of(&leaf)),
            1 => {
                if let Some(top) = stack.pop() {
                    stack.push(top.nullable());
                }
            }
            2 => {
                if let Some(top) = stack.pop() {
                    stack.push(top.with_qualifier(QualifierTag::new(format!("app.Tag{}", byte >> 2))));
                }
            }
            _ => {
                if stack.len() >= 2 {
                    let b = stack.pop().unwrap_or_else(|| TypeRef::of(&leaf));
                    let a = stack.pop().unwrap_or_else(|| TypeRef::of(&leaf));
                    stack.push(TypeRef::with_arguments(&pair, vec![a, b]));
                }
            }
        }
    }

    let limit = 32 + (data[0] as usize);
    for ty in &stack {
        let name = ty.unique_name_with_limit(limit);
        assert!(name.len() <= limit.max(17));
        assert_eq!(name, ty.unique_name_with_limit(limit));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
});
