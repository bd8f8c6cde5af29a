use rand::SeedableRng;
use svo_store::errors::OctreeResult;
use svo_int_test::test_util::{build_random_octree, create_test_context};

fn main() -> OctreeResult<()> {
    println!("Starting octree stress test...");
    let ctx = create_test_context()?;
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);

    let start = std::time::Instant::now();
    let store = ctx.create_store(0)?;
    let written = build_random_octree(&store, 6, &mut rng)?;
    store.write_header()?;
    store.close()?;
    println!("Wrote {} nodes in {:?}", written.len(), start.elapsed());

    let start = std::time::Instant::now();
    let store = ctx.reopen_store()?;
    let mut leaves = 0u64;
    store.walk(0, |_, node, _| {
        if node.has_data() {
            leaves += 1;
        }
        Ok(())
    })?;
    println!("Walked {} leaves in {:?}", leaves, start.elapsed());

    let start = std::time::Instant::now();
    let mut records = 0u64;
    for record in store.data_records() {
        record?;
        records += 1;
    }
    println!("Read {} data records in {:?}", records, start.elapsed());

    store.close()
}
