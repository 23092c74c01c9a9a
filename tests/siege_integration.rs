//! Siege integration tests

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use conflict_engine::core::types::{NationId, SettlementId, HOUR_MS};
use conflict_engine::events::{ConflictEvent, RecordingSink};
use conflict_engine::external::{Collaborators, SettlementRegistry};
use conflict_engine::persistence::MemoryStore;
use conflict_engine::random::ScriptedRolls;
use conflict_engine::sandbox::SandboxWorld;
use conflict_engine::siege::{Siege, SiegeRating};
use conflict_engine::warfare::{DeclareWar, WarType};
use conflict_engine::{ConflictConfig, ConflictEngine, ConflictError, EngineStores};

const START: u64 = 5_000_000;

struct Fixture {
    world: Arc<SandboxWorld>,
    engine: ConflictEngine,
    events: Arc<RecordingSink>,
    siege_store: Arc<MemoryStore<Siege>>,
    attacker: NationId,
    defender: NationId,
    keep: SettlementId,
}

fn setup() -> Fixture {
    let world = SandboxWorld::new();
    let attacker = world.add_nation("carrow", 50_000.0);
    let defender = world.add_nation("dunmere", 50_000.0);
    let keep = world.add_settlement("dunmere-keep", &defender);

    let siege_store = Arc::new(MemoryStore::<Siege>::new());
    let stores = EngineStores {
        sieges: siege_store.clone(),
        ..EngineStores::in_memory()
    };
    let events = Arc::new(RecordingSink::new());
    let engine = ConflictEngine::load(
        ConflictConfig::default(),
        world.collaborators(),
        stores,
        events.clone(),
        Box::new(ScriptedRolls::constant(0.99)),
    );
    Fixture {
        world,
        engine,
        events,
        siege_store,
        attacker,
        defender,
        keep,
    }
}

fn go_to_war(fx: &Fixture) {
    let request = DeclareWar::new(fx.attacker.as_str(), fx.defender.as_str(), WarType::Territorial);
    fx.engine.declare_war(request, START).unwrap();
}

#[test]
fn test_siege_requires_a_war() {
    let fx = setup();

    let err = fx
        .engine
        .start_siege(&fx.keep, &fx.attacker, &fx.defender, START)
        .unwrap_err();
    assert!(matches!(err, ConflictError::PreconditionFailed(_)));
    assert!(!fx.engine.sieges().is_under_siege(&fx.keep));
    assert!(fx.siege_store.is_empty());
    assert!(fx.events.events().is_empty());
}

#[test]
fn test_siege_validation() {
    let fx = setup();
    go_to_war(&fx);

    let own = fx.engine.start_siege(&fx.keep, &fx.defender, &fx.defender, START);
    assert!(matches!(own, Err(ConflictError::Validation(_))));

    let unknown = fx
        .engine
        .start_siege(&"ghost-town".into(), &fx.attacker, &fx.defender, START);
    assert!(matches!(unknown, Err(ConflictError::Validation(_))));

    // The named defender must actually own the settlement
    let wrong_owner = fx
        .engine
        .start_siege(&fx.keep, &fx.defender, &fx.attacker, START);
    assert!(matches!(wrong_owner, Err(ConflictError::Validation(_))));

    let blank = fx
        .engine
        .start_siege(&"  ".into(), &fx.attacker, &fx.defender, START);
    assert!(matches!(blank, Err(ConflictError::Validation(_))));
}

#[test]
fn test_settlement_cannot_be_besieged_twice() {
    let fx = setup();
    go_to_war(&fx);

    fx.engine
        .start_siege(&fx.keep, &fx.attacker, &fx.defender, START)
        .unwrap();
    let again = fx
        .engine
        .start_siege(&fx.keep, &fx.attacker, &fx.defender, START + 1);
    assert!(matches!(again, Err(ConflictError::PreconditionFailed(_))));
    assert_eq!(fx.engine.sieges().len(), 1);
}

#[test]
fn test_completed_siege_transfers_the_settlement() {
    let fx = setup();
    go_to_war(&fx);
    fx.engine
        .start_siege(&fx.keep, &fx.attacker, &fx.defender, START)
        .unwrap();
    assert!(fx.siege_store.get(fx.keep.as_str()).is_some());

    let mut last = 0.0;
    for _ in 0..49 {
        assert!(fx.engine.run_siege_tick().is_empty());
        let progress = fx.engine.sieges().siege(&fx.keep).unwrap().progress;
        assert!(progress > last);
        last = progress;
    }
    assert_eq!(last, 98.0);
    assert_eq!(fx.world.owner(&fx.keep), Some(fx.defender.clone()));

    let captured = fx.engine.run_siege_tick();
    assert_eq!(captured, vec![fx.keep.clone()]);
    assert_eq!(fx.world.owner(&fx.keep), Some(fx.attacker.clone()));
    assert!(!fx.engine.sieges().is_under_siege(&fx.keep));
    assert!(fx.siege_store.is_empty());
    assert_eq!(
        fx.events
            .count(|e| matches!(e, ConflictEvent::SettlementCaptured { .. })),
        1
    );
}

#[test]
fn test_failed_transfer_keeps_the_siege_for_a_retry() {
    let fx = setup();
    go_to_war(&fx);
    fx.engine
        .start_siege(&fx.keep, &fx.attacker, &fx.defender, START)
        .unwrap();
    fx.world.block_transfers(&fx.keep, true);

    for _ in 0..55 {
        assert!(fx.engine.run_siege_tick().is_empty());
    }
    let siege = fx.engine.sieges().siege(&fx.keep).unwrap();
    assert_eq!(siege.progress, 100.0);
    assert_eq!(fx.world.owner(&fx.keep), Some(fx.defender.clone()));

    fx.world.block_transfers(&fx.keep, false);
    assert_eq!(fx.engine.run_siege_tick(), vec![fx.keep.clone()]);
    assert_eq!(fx.world.owner(&fx.keep), Some(fx.attacker.clone()));
}

#[test]
fn test_siege_statistics() {
    let fx = setup();
    go_to_war(&fx);
    fx.engine
        .start_siege(&fx.keep, &fx.attacker, &fx.defender, START)
        .unwrap();
    for _ in 0..10 {
        fx.engine.run_siege_tick();
    }

    let besieger = fx
        .engine
        .sieges()
        .nation_statistics(&fx.attacker, START + 2 * HOUR_MS);
    assert_eq!(besieger.attacking.len(), 1);
    assert!(besieger.defending.is_empty());
    assert_eq!(besieger.rating, SiegeRating::Initial);
    assert_eq!(besieger.attacking[0].progress, 20.0);
    assert_eq!(besieger.attacking[0].duration_hours, 2);
    assert_eq!(besieger.attacking[0].opponent, fx.defender);

    let besieged = fx
        .engine
        .sieges()
        .nation_statistics(&fx.defender, START + 2 * HOUR_MS);
    assert_eq!(besieged.defending.len(), 1);
    assert_eq!(besieged.rating, SiegeRating::NoSieges);

    let global = fx.engine.sieges().global_statistics();
    assert_eq!(global.active_sieges, 1);
    assert_eq!(global.average_progress, 20.0);
    assert_eq!(global.by_attacker.get(&fx.attacker), Some(&1));
}

/// Settlement registry whose transfers wait until the test lets them through
struct GatedSettlements {
    world: Arc<SandboxWorld>,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl SettlementRegistry for GatedSettlements {
    fn owner(&self, settlement: &SettlementId) -> Option<NationId> {
        self.world.owner(settlement)
    }

    fn transfer_ownership(
        &self,
        settlement: &SettlementId,
        new_owner: &NationId,
    ) -> conflict_engine::Result<()> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        self.world.transfer_ownership(settlement, new_owner)
    }
}

#[test]
fn test_capture_in_flight_wins_over_a_peace_lifting_the_siege() {
    let world = SandboxWorld::new();
    let attacker = world.add_nation("carrow", 50_000.0);
    let defender = world.add_nation("dunmere", 50_000.0);
    let keep = world.add_settlement("dunmere-keep", &defender);

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let settlements = Arc::new(GatedSettlements {
        world: world.clone(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let collab = Collaborators::new(world.clone(), world.clone(), settlements)
        .with_military(world.clone())
        .with_stability(world.clone());
    let siege_store = Arc::new(MemoryStore::<Siege>::new());
    let events = Arc::new(RecordingSink::new());
    let engine = ConflictEngine::load(
        ConflictConfig::default(),
        collab,
        EngineStores {
            sieges: siege_store.clone(),
            ..EngineStores::in_memory()
        },
        events.clone(),
        Box::new(ScriptedRolls::constant(0.99)),
    );

    let declare = || DeclareWar::new(attacker.as_str(), defender.as_str(), WarType::Territorial);
    let war = engine.declare_war(declare(), START).unwrap();
    engine.start_siege(&keep, &attacker, &defender, START).unwrap();
    for _ in 0..49 {
        assert!(engine.run_siege_tick().is_empty());
    }

    thread::scope(|scope| {
        let capture = scope.spawn(|| engine.run_siege_tick());
        entered_rx.recv().unwrap();

        let peace = scope.spawn(|| engine.sue_for_peace(&war, START + 1));
        while world.peace_treaties() == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));

        // A fresh war cannot reopen a siege the capture still holds
        engine.declare_war(declare(), START + 2).unwrap();
        let reopened = engine.start_siege(&keep, &attacker, &defender, START + 2);
        assert!(matches!(reopened, Err(ConflictError::PreconditionFailed(_))));

        release_tx.send(()).unwrap();
        assert_eq!(capture.join().unwrap(), vec![keep.clone()]);
        peace.join().unwrap().unwrap();
    });

    assert_eq!(world.owner(&keep), Some(attacker.clone()));
    assert!(!engine.sieges().is_under_siege(&keep));
    assert!(siege_store.is_empty());
    assert_eq!(
        events.count(|e| matches!(e, ConflictEvent::SettlementCaptured { .. })),
        1
    );
    assert_eq!(
        events.count(|e| matches!(e, ConflictEvent::SiegeLifted { .. })),
        0
    );
}
