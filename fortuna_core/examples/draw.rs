use fortuna_core::{PrizeTable, ProvablyFairRng, SpinEvent, SpinSequencer, SpinTiming, Tier, Trigger};

fn main() {
    // Example end-to-end draw on a virtual timeline
    let server_seed = "example-server-seed";
    let client_seed = "example-client-seed";
    let nonce = 1u64;
    let rng = ProvablyFairRng::new(server_seed, client_seed, nonce);
    let table = PrizeTable::builtin();
    let mut seq = SpinSequencer::with_timeline(
        table.tier(Tier::T1000).clone(),
        SpinTiming::normal(),
        rng.stream(),
    );
    assert_eq!(seq.trigger(), Trigger::Started);
    for timed in seq.run_to_end() {
        match timed.event {
            SpinEvent::ReelLocked { reel, label } => {
                println!("{:>5}ms reel {} -> {}", timed.at.as_millis(), reel + 1, label)
            }
            SpinEvent::Revealed {
                result,
                celebration,
            } => println!(
                "{:>5}ms server_seed_hash={} prize={} value={} celebration={:?}",
                timed.at.as_millis(),
                rng.server_seed_hash_hex(),
                result.label,
                result.value,
                celebration
            ),
            SpinEvent::Frame { .. } => {}
        }
    }
}
