use chugware::{
    core::{StoreError, participants::ParticipantStore, results::ResultStore},
    participant::{Participant, ParticipantPatch},
    persist::PersistError,
    result::ResultDraft,
    types::{Discipline, MAX_STRING_LENGTH, Status},
};

fn pass(name: &str, base: &str, additional: &str) -> ResultDraft {
    ResultDraft::new(name, Discipline::Bottle, Status::Pass)
        .base_time(base)
        .additional_time(additional)
}

#[test]
fn participants_survive_save_and_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("participants.json");

    let mut store = ParticipantStore::open(&path).expect("open missing file");
    assert!(store.is_empty());
    store
        .add(Participant::register("Alice", "CS", "Red"))
        .expect("add alice");
    store
        .add(Participant::register("Bob", "EE", "Blue"))
        .expect("add bob");
    store.save().expect("save");

    let reloaded = ParticipantStore::open(&path).expect("reload");
    assert_eq!(reloaded.list(), store.list());
    let alice = reloaded.get("Alice").expect("alice");
    assert_eq!(alice.bottle, "3");
    assert_eq!(alice.half_tankard, "2");
    assert_eq!(alice.full_tankard, "1");
}

#[test]
fn files_without_counters_load_with_empty_counters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("participants.json");
    std::fs::write(&path, r#"[{"name":"Old","program":"X","team":"Y"}]"#).expect("write");

    let store = ParticipantStore::open(&path).expect("open");
    let old = store.get("Old").expect("old");
    assert_eq!(old.bottle, "");
    assert!(!old.is_eligible(Discipline::Bottle));
}

#[test]
fn add_rejects_duplicates_and_bad_fields() {
    let mut store = ParticipantStore::new();
    store.add(Participant::register("Alice", "", "")).expect("add");

    assert!(matches!(
        store.add(Participant::register("Alice", "CS", "Red")),
        Err(StoreError::DuplicateName(name)) if name == "Alice"
    ));
    assert!(matches!(
        store.add(Participant::register("   ", "CS", "Red")),
        Err(StoreError::EmptyName)
    ));
    assert!(matches!(
        store.add(Participant::register("Long", "x".repeat(MAX_STRING_LENGTH + 1), "")),
        Err(StoreError::FieldTooLong { field: "program" })
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn list_returns_a_copy() {
    let mut store = ParticipantStore::new();
    store.add(Participant::register("Alice", "CS", "Red")).expect("add");

    let mut copy = store.list();
    copy[0].bottle = "0".to_string();
    copy.clear();

    assert_eq!(store.get("Alice").expect("alice").bottle, "3");
    assert_eq!(store.len(), 1);
}

#[test]
fn decrement_floors_at_zero_and_ignores_uncounted() {
    let mut store = ParticipantStore::new();
    store.add(Participant::register("Carl", "", "")).expect("add");

    assert!(store.decrement_tries("Carl", Discipline::FullTankard).expect("first"));
    assert!(!store.decrement_tries("Carl", Discipline::FullTankard).expect("second"));
    assert_eq!(store.get("Carl").expect("carl").full_tankard, "0");

    assert!(!store.decrement_tries("Carl", Discipline::TeamClash).expect("uncounted"));
    assert!(matches!(
        store.decrement_tries("Nobody", Discipline::Bottle),
        Err(StoreError::MissingParticipant(_))
    ));
}

#[test]
fn rename_cannot_collide() {
    let mut store = ParticipantStore::new();
    store.add(Participant::register("Alice", "", "")).expect("alice");
    store.add(Participant::register("Bob", "", "")).expect("bob");

    let patch = ParticipantPatch {
        name: Some("Bob".to_string()),
        ..ParticipantPatch::default()
    };
    assert!(matches!(
        store.update("Alice", &patch),
        Err(StoreError::DuplicateName(_))
    ));

    let patch = ParticipantPatch {
        name: Some("Alicia".to_string()),
        team: Some("Green".to_string()),
        ..ParticipantPatch::default()
    };
    let edited = store.update("Alice", &patch).expect("rename");
    assert_eq!(edited.team, "Green");
    assert!(store.get("Alice").is_none());
    assert_eq!(store.remove("Alicia").expect("remove").name, "Alicia");
}

#[test]
fn save_without_path_is_an_error() {
    let store = ParticipantStore::new();
    assert!(matches!(
        store.save(),
        Err(StoreError::Persist(PersistError::NoPath))
    ));
}

#[test]
fn final_time_is_base_plus_additional() {
    let mut results = ResultStore::new();
    let rec = results.add(pass("Alice", "00:00:07", "2")).expect("add");
    assert_eq!(rec.time, "00:00:09.0000");
    assert_eq!(rec.status, Status::Pass);
}

#[test]
fn disqualified_results_always_store_nan() {
    let mut results = ResultStore::new();
    let rec = results
        .add(
            ResultDraft::new("Alice", Discipline::HalfTankard, Status::Disqualified)
                .base_time("00:00:07")
                .comment("spilled"),
        )
        .expect("add");
    assert_eq!(rec.time, "NaN");
    assert_eq!(rec.base_time, "00:00:07.0000");
}

#[test]
fn update_last_touches_only_the_newest_entry() {
    let mut results = ResultStore::new();
    results.add(pass("Alice", "10", "")).expect("first");
    results.add(pass("Alice", "12", "")).expect("second");
    results.add(pass("Bob", "11", "")).expect("bob");

    let updated = results.update_last(pass("Alice", "9", "1")).expect("update");
    assert_eq!(updated.time, "00:00:10.0000");

    let alice = results.list_by_participant("Alice");
    assert_eq!(alice.len(), 2);
    assert_eq!(alice[0].time, "00:00:10.0000");
    assert_eq!(alice[0].base_time, "00:00:10.0000");
    assert_eq!(alice[1].base_time, "00:00:09.0000");
    assert_eq!(alice[1].additional_time, "00:00:01.0000");
    assert_eq!(
        results.last_for("Bob", Discipline::Bottle).expect("bob").base_time,
        "00:00:11.0000"
    );
}

#[test]
fn disqualified_entry_is_frozen() {
    let mut results = ResultStore::new();
    results
        .add(ResultDraft::new("Alice", Discipline::Bottle, Status::Disqualified))
        .expect("dq");

    assert!(matches!(
        results.update_last(pass("Alice", "8", "")),
        Err(StoreError::Frozen { .. })
    ));
    assert!(matches!(
        results.update_last(pass("Bob", "8", "")),
        Err(StoreError::NoResultToUpdate { .. })
    ));
}

#[test]
fn results_reload_with_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("results.json");

    let mut results = ResultStore::open(&path).expect("open");
    results.add(pass("Alice", "10", "")).expect("a");
    results
        .add(ResultDraft::new("Alice", Discipline::FullTankard, Status::Fail))
        .expect("b");
    results.save().expect("save");

    let mut reloaded = ResultStore::open(&path).expect("reload");
    assert_eq!(reloaded.list_all(), results.list_all());
    assert_eq!(reloaded.list_by_discipline(Discipline::FullTankard).len(), 1);

    let updated = reloaded.update_last(pass("Alice", "8", "")).expect("update after reload");
    assert_eq!(updated.time, "00:00:08.0000");
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn corrupt_file_reports_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("results.json");
    std::fs::write(&path, "{ not json").expect("write");

    assert!(matches!(
        ResultStore::open(&path),
        Err(StoreError::Persist(PersistError::Parse { .. }))
    ));
}

#[test]
fn stored_times_are_canonical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("results.json");
    let mut results = ResultStore::open(&path).expect("open");
    results.add(pass("Alice", "10", "")).expect("plain seconds");
    results.add(pass("Bob", "nan", "")).expect("nan");
    results.save().expect("save");

    let text = std::fs::read_to_string(&path).expect("read");
    assert!(text.contains("\"base_time\": \"00:00:10.0000\""), "{text}");
    assert!(text.contains("\"base_time\": \"NaN\""), "{text}");
    assert!(!text.contains("\"10\""));
    assert_eq!(results.list_all()[0].additional_time, "");
}

#[test]
fn unparseable_times_are_rejected() {
    let mut results = ResultStore::new();
    assert!(matches!(
        results.add(pass("Alice", "junk", "")),
        Err(StoreError::InvalidTime { field: "base time", text }) if text == "junk"
    ));
    assert!(matches!(
        results.add(pass("Alice", "7", "a while")),
        Err(StoreError::InvalidTime { field: "additional time", .. })
    ));
    assert!(results.is_empty());

    results.add(pass("Alice", "7", "")).expect("valid");
    assert!(matches!(
        results.update_last(pass("Alice", "soon", "")),
        Err(StoreError::InvalidTime { .. })
    ));
    assert_eq!(results.list_all()[0].time, "00:00:07.0000");
}

#[test]
fn failed_commit_leaves_the_list_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut results = ResultStore::new();
    results.add(pass("Alice", "7", "")).expect("in memory");
    results.set_path(dir.path());

    assert!(matches!(
        results.commit(pass("Alice", "8", "")),
        Err(StoreError::Persist(PersistError::Write { .. }))
    ));
    assert_eq!(results.len(), 1);
    let last = results.last_for("Alice", Discipline::Bottle).expect("alice");
    assert_eq!(last.base_time, "00:00:07.0000");

    results.set_path(dir.path().join("results.json"));
    results.commit(pass("Alice", "8", "")).expect("commit");
    assert_eq!(results.len(), 2);
    assert_eq!(ResultStore::open(dir.path().join("results.json")).expect("reload").len(), 2);
}

#[test]
fn standings_rank_passes_by_time_with_nan_last() {
    let mut results = ResultStore::new();
    results.add(pass("Slow", "20", "")).expect("slow");
    results
        .add(ResultDraft::new("Spill", Discipline::Bottle, Status::Disqualified).base_time("5"))
        .expect("dq");
    results.add(pass("Fast", "8", "1")).expect("fast");
    results
        .add(ResultDraft::new("Quit", Discipline::Bottle, Status::Fail).base_time("3"))
        .expect("fail");
    results.add(pass("Other", "1", "")).expect("other discipline");
    results
        .update_last(
            ResultDraft::new("Other", Discipline::Bottle, Status::Pass).base_time("30"),
        )
        .expect("update");
    results
        .add(ResultDraft::new("Tank", Discipline::FullTankard, Status::Pass).base_time("2"))
        .expect("tank");

    let names: Vec<String> = results
        .standings(Discipline::Bottle)
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Fast", "Slow", "Other", "Quit", "Spill"]);
}

#[test]
fn standings_rank_corrupt_loaded_time_like_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("results.json");
    let row = |name: &str, time: &str| {
        format!(
            r#"{{"name":"{name}","discipline":"Bottle","time":"{time}","base_time":"","additional_time":"","status":"Pass","comment":""}}"#
        )
    };
    let body = format!(
        "[{},{},{}]",
        row("Late", "00:00:04.0000"),
        row("Garbled", "quick"),
        row("Zero", "00:00:00.0000")
    );
    std::fs::write(&path, body).expect("write");

    let results = ResultStore::open(&path).expect("open");
    let names: Vec<String> = results
        .standings(Discipline::Bottle)
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Garbled", "Zero", "Late"]);
}
