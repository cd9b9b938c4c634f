use std::time::Instant;

use featrack::track::reference;
use featrack::{
    assemble, Block, ChunkExecutor, ExecutorOptions, NibFile, NibSequence, Result, SubRange,
    TrackQuery,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let num_threads = args
        .get(1)
        .map(|s| s.parse::<usize>())
        .transpose()
        .map_err(|e| featrack::Error::from(anyhow::Error::from(e)))?
        .unwrap_or(4);
    let num_bases = args
        .get(2)
        .map(|s| s.parse::<u32>())
        .transpose()
        .map_err(|e| featrack::Error::from(anyhow::Error::from(e)))?
        .unwrap_or(4_000_000);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("chr1.nib");

    let mut rng = SmallRng::seed_from_u64(7);
    let alphabet = b"ACGTN";
    let bases: Vec<u8> = (0..num_bases)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect();
    NibFile::write(&path, &NibSequence::from_bases(&bases)?)?;

    let file = NibFile::open(&path)?;
    let sequence = file.sequence();
    println!("Wrote {} bases to {path:?}", file.num_bases());

    let query = TrackQuery::new(1, 1, 1, num_bases as i32);
    let reader = move |range: &SubRange| -> Result<Vec<Block<u8>>> {
        reference::base_blocks(&sequence, (range.start + 1) as i32, range.end as i32)
    };

    let started = Instant::now();
    let sequential = assemble(&query, 1_000_000, &ChunkExecutor::sequential(), None, &reader)?;
    let sequential_time = started.elapsed();
    println!(
        "Sequential: {} blocks in {sequential_time:.2?}",
        sequential.blocks.len()
    );

    let executor = ChunkExecutor::parallel(&ExecutorOptions::new(num_threads));
    let started = Instant::now();
    let parallel = assemble(&query, 1_000_000, &executor, None, &reader)?;
    let parallel_time = started.elapsed();
    println!(
        "Parallel ({num_threads} threads): {} blocks in {parallel_time:.2?}",
        parallel.blocks.len()
    );
    println!("Tracks identical: {}", sequential == parallel);
    if parallel_time.as_secs_f64() > 0.0 {
        println!(
            "Speedup: {:.2}x",
            sequential_time.as_secs_f64() / parallel_time.as_secs_f64()
        );
    }

    // GC content summarized into thousand-base windows
    let gc_query = query.clone().with_scale_factor(0.001);
    let bounds = gc_query.validate()?;
    let gc_reader = move |range: &SubRange| -> Result<Vec<Block<f32>>> {
        reference::gc_blocks(
            &sequence,
            (range.start + 1) as i32,
            range.end as i32,
            bounds.scale_factor,
        )
    };
    let gc = assemble(
        &gc_query,
        1_000_000,
        &ChunkExecutor::sequential(),
        None,
        &gc_reader,
    )?;
    println!();
    println!("GC fraction over the first windows:");
    for block in gc.blocks.iter().take(5) {
        println!(
            "  {:>9}-{:<9} {:.3}",
            block.start_index, block.end_index, block.payload
        );
    }
    Ok(())
}
