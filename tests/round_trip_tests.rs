//! Round-trip tests: schema -> blob -> decoded descriptor


use contract_blob::format::{FieldRecord, Record, CONTRACT_MAGIC, MAGIC_SIZE};
use contract_blob::{ContractReader, GlobalDecl, Schema, TypeDecl, TypeSize};
use test_fixtures::{build_64, directory, thread_schema, BASELINE, THREAD_STORE_ADDRESS};

#[test]
fn test_thread_store_example_decodes() {
    let blob = build_64(&thread_schema());
    let reader = ContractReader::parse(blob.as_bytes()).unwrap();

    assert_eq!(reader.type_count(), 2);
    assert_eq!(reader.global_count().unwrap(), 2);
    assert_eq!(reader.baseline().unwrap(), BASELINE);

    let thread = reader.find_type("ManagedThread").unwrap().unwrap();
    assert_eq!(thread.size, 0);
    let thread_fields: Vec<FieldRecord> = reader
        .fields(&thread)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(thread_fields.len(), 2);

    let handle = reader.find_type("GCHandle").unwrap().unwrap();
    assert_eq!(handle.size, 8);
    assert_eq!(reader.fields(&handle).unwrap().count(), 0);

    let store = reader.find_global("ManagedThreadStore").unwrap().unwrap();
    assert_eq!(store.value, THREAD_STORE_ADDRESS);
    assert_eq!(reader.string_at(store.type_name).unwrap(), "pointer");

    let flag = reader.find_global("FeatureEHFunclets").unwrap().unwrap();
    assert_eq!(flag.value, 1);
    assert_eq!(reader.string_at(flag.type_name).unwrap(), "uint8");
}

#[test]
fn test_handle_run_is_one_terminator_long() {
    let blob = build_64(&thread_schema());
    let bytes = blob.as_bytes();
    let dir = directory(bytes);
    let reader = ContractReader::parse(bytes).unwrap();

    let handle = reader.type_at(1).unwrap();
    let stride = dir.field_record_size as usize;
    let at = MAGIC_SIZE + dir.field_pool_start as usize + handle.fields as usize;

    assert!(FieldRecord::decode(&bytes[at..at + stride]).is_terminator());
    assert_eq!(handle.fields as usize / stride, dir.field_pool_count as usize - 1);
}

#[test]
fn test_decode_reproduces_schema() {
    let descriptor = build_64(&thread_schema())
        .reader()
        .unwrap()
        .decode()
        .unwrap();

    assert_eq!(descriptor.baseline, BASELINE);

    let thread = descriptor.find_type("ManagedThread").unwrap();
    assert!(thread.is_indeterminate());
    let names: Vec<(&str, &str, u16)> = thread
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.type_name.as_str(), f.offset))
        .collect();
    assert_eq!(
        names,
        vec![("GCHandle", "GCHandle", 0), ("Next", "pointer", 8)]
    );

    assert_eq!(descriptor.find_type("GCHandle").unwrap().size, Some(8));
    assert_eq!(
        descriptor.find_global("ManagedThreadStore").unwrap().value,
        THREAD_STORE_ADDRESS
    );
}

#[test]
fn test_reserved_zero_invariants() {
    let blob = build_64(&thread_schema());
    let bytes = blob.as_bytes();
    let dir = directory(bytes);
    let reader = ContractReader::parse(bytes).unwrap();

    assert_eq!(reader.names_pool().unwrap()[0], 0);

    let pool_at = MAGIC_SIZE + dir.field_pool_start as usize;
    let stride = dir.field_record_size as usize;
    assert!(bytes[pool_at..pool_at + stride].iter().all(|&b| b == 0));

    for ty in reader.types().unwrap() {
        assert_ne!(ty.fields, 0);
        assert_ne!(ty.name, 0);
    }
}

#[test]
fn test_offsets_are_region_relative() {
    let blob = build_64(&thread_schema());
    let bytes = blob.as_bytes();
    let dir = directory(bytes);

    assert_eq!(&bytes[..MAGIC_SIZE], CONTRACT_MAGIC);
    // Types begin right after the directory and baseline offset
    assert_eq!(dir.types_start, 36);

    let reader = ContractReader::parse(bytes).unwrap();
    let thread = reader.type_at(0).unwrap();
    // First run starts right after the reserved record, relative to the pool
    assert_eq!(thread.fields, dir.field_record_size as u32);
    // Names are relative to the pool: the baseline is the first string
    assert_eq!(reader.string_at(1).unwrap(), BASELINE);
}

#[test]
fn test_same_schema_builds_identical_bytes() {
    let a = build_64(&thread_schema());
    let b = build_64(&thread_schema());

    assert_eq!(a.as_bytes(), b.as_bytes());
    assert_eq!(a.digest(), b.digest());
}

#[test]
fn test_duplicate_text_gets_distinct_offsets() {
    let schema = Schema::new("dup")
        .with_type(TypeDecl::new("A", TypeSize::Fixed(8)).field("p", "pointer", 0))
        .with_global(GlobalDecl::new("G", "pointer", 0));
    let blob = build_64(&schema);
    let reader = ContractReader::parse(blob.as_bytes()).unwrap();

    let ty = reader.type_at(0).unwrap();
    let field = reader.fields(&ty).unwrap().next().unwrap().unwrap();
    let global = reader.global_at(0).unwrap();

    assert_ne!(field.type_name, global.type_name);
    assert_eq!(reader.string_at(field.type_name).unwrap(), "pointer");
    assert_eq!(reader.string_at(global.type_name).unwrap(), "pointer");
}

#[test]
fn test_descriptor_round_trips_through_schema() {
    let descriptor = build_64(&thread_schema()).reader().unwrap().decode().unwrap();
    let rebuilt = build_64(&descriptor.to_schema());

    assert_eq!(rebuilt.reader().unwrap().decode().unwrap(), descriptor);
}
