//! Jitter simulation: an authoritative server scope drives a client world over
//! an ordered channel whose latency varies per frame.
//!
//! Server objects wander randomly, change speed and sometimes teleport. Each
//! server frame is encoded and held back for a random number of frames, but
//! never overtakes an earlier one. When the run ends the server stops, the
//! channel drains, a full resync is sent, and the client and server state
//! hashes are compared.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=netrose_client=debug cargo run --example jitter_sim -- [seed]
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::info;

use netrose_client::prelude::*;
use netrose_grid::prelude::*;
use netrose_protocol::prelude::*;
use netrose_server::prelude::*;

const SCOPE: ScopeId = ScopeId(1);
const OBJECTS: u32 = 16;
const FRAMES: u64 = 1_800;
const MAX_DELAY_FRAMES: u64 = 12;
const DT: f64 = 1.0 / 60.0;

/// Ordered channel with per-frame latency.
struct JitterChannel {
    in_flight: VecDeque<(u64, Vec<Vec<u8>>)>,
    last_due: u64,
}

impl JitterChannel {
    fn new() -> Self {
        Self {
            in_flight: VecDeque::new(),
            last_due: 0,
        }
    }

    /// Send one frame of envelopes. Its delivery frame never precedes the
    /// previous frame's.
    fn send(&mut self, now: u64, delay: u64, frame: Vec<Vec<u8>>) {
        let due = (now + delay).max(self.last_due);
        self.last_due = due;
        self.in_flight.push_back((due, frame));
    }

    fn receive(&mut self, now: u64) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while self.in_flight.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, frame)) = self.in_flight.pop_front() {
                out.extend(frame);
            }
        }
        out
    }

    fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

fn catalog() -> Arc<MapCatalog> {
    let mut map = GridMap::new(MapId(1), 40, 40);
    for i in 10..30 {
        map = map.with_blocked(20, i).with_blocked(i, 20);
    }
    Arc::new(MapCatalog::new().with_map(map))
}

fn drive_server(server: &mut ServerScope, rng: &mut Pcg64) -> Result<()> {
    for object in 0..OBJECTS {
        let obj = server.object_mut(ObjectId(object))?;
        if obj.model().is_moving() {
            continue;
        }
        match rng.gen_range(0..100) {
            0..=59 => {
                let direction = Direction::ALL[rng.gen_range(0..4)];
                obj.start_movement(direction);
            }
            60..=63 => obj.set_speed(rng.gen_range(2..=10)),
            64 => {
                let (x, y) = (rng.gen_range(0..40), rng.gen_range(0..40));
                obj.teleport(x, y)?;
            }
            65..=66 => obj.set_orientation(Direction::ALL[rng.gen_range(0..4)]),
            _ => {}
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let seed = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("seed must be an unsigned integer")?,
        None => 7,
    };
    let mut rng = Pcg64::seed_from_u64(seed);

    let mut server: ServerScope = ServerScope::new(SCOPE);
    for object in 0..OBJECTS {
        let mut model = MapObject::new(catalog()).with_speed(rng.gen_range(3..=8));
        model.attach(MapId(1), rng.gen_range(0..10), rng.gen_range(0..10), true)?;
        server.spawn(ObjectId(object), model, object.to_be_bytes().to_vec())?;
    }

    let shared = catalog();
    let mut client: ClientWorld<MapObject> =
        ClientWorld::new(ClientConfig::default(), move |_| MapObject::new(shared.clone()));
    let mut channel = JitterChannel::new();

    let mut now = 0;
    let mut sent = 0usize;
    let mut sync_errors = 0usize;
    let mut deliver = |client: &mut ClientWorld<MapObject>, channel: &mut JitterChannel, now: u64| {
        for bytes in channel.receive(now) {
            if let Err(e) = client.receive(&bytes) {
                sync_errors += 1;
                tracing::warn!(error = %e, "client rejected envelope");
            }
        }
    };

    while now < FRAMES {
        drive_server(&mut server, &mut rng)?;
        server.advance(DT);
        let frame = server.encode_outbox()?;
        sent += frame.len();
        channel.send(now, rng.gen_range(0..=MAX_DELAY_FRAMES), frame);
        deliver(&mut client, &mut channel, now);
        client.tick();
        now += 1;
    }

    // Stop the server, flush the channel, then let the client catch up.
    while !server.is_settled() {
        server.advance(DT);
        channel.send(now, 0, server.encode_outbox()?);
        deliver(&mut client, &mut channel, now);
        client.tick();
        now += 1;
    }
    while !channel.is_empty() {
        deliver(&mut client, &mut channel, now);
        client.tick();
        now += 1;
    }
    client.run_until_settled(100_000);

    let replay_hash = client.scope_state_hash(SCOPE);
    let server_hash = server.state_hash();
    let replay_converged = replay_hash == server_hash;

    server.resync_all();
    channel.send(now, 0, server.encode_outbox()?);
    deliver(&mut client, &mut channel, now);
    client.run_until_settled(100_000);

    let accelerations: u64 = client
        .handles()
        .filter_map(|h| client.adapter(h))
        .map(|a| a.queue().stats().accelerations)
        .sum();

    info!(seed, frames = now, envelopes = sent, accelerations, "run finished");
    println!("seed              {seed}");
    println!("frames            {now}");
    println!("envelopes sent    {sent}");
    println!("accelerations     {accelerations}");
    println!("sync errors       {sync_errors}");
    println!("replay converged  {replay_converged}");
    println!("server hash       {server_hash}");
    println!("client hash       {}", client.scope_state_hash(SCOPE));

    ensure!(
        client.scope_state_hash(SCOPE) == server.state_hash(),
        "client diverged from server after resync"
    );
    Ok(())
}
