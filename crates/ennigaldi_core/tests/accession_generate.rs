use ennigaldi_core::db::open_db_in_memory;
use ennigaldi_core::{
    AccessionNumber, AccessionService, AccessionServiceError, BatchService, NewWork, RelationType,
    SqliteAccessionRepository, SqliteBatchRepository, SqliteWorkRepository, WorkId,
    WorkRepository, WorkType,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn accession_service(
    conn: &Connection,
) -> AccessionService<SqliteAccessionRepository<'_>, SqliteWorkRepository<'_>> {
    AccessionService::new(
        SqliteAccessionRepository::try_new(conn).unwrap(),
        SqliteWorkRepository::try_new(conn).unwrap(),
    )
}

fn batch_service(conn: &Connection) -> BatchService<SqliteBatchRepository<'_>> {
    BatchService::new(SqliteBatchRepository::try_new(conn).unwrap())
}

fn register(conn: &Connection, title: &str) -> WorkId {
    let works = SqliteWorkRepository::try_new(conn).unwrap();
    works
        .register_work(&NewWork::new(WorkType::Artifact, title))
        .unwrap()
        .work_id
}

fn link(conn: &Connection, lesser: WorkId, greater: WorkId, relation: RelationType) {
    let works = SqliteWorkRepository::try_new(conn).unwrap();
    works.link_works(lesser, greater, relation).unwrap();
}

fn allocation_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM accession_numbers;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn registration_scenario_numbers_objects_and_parts() {
    let conn = setup();
    let batches = batch_service(&conn);
    let service = accession_service(&conn);

    let batch = batches.start_batch_in_year(2024, false, "").unwrap();
    assert_eq!(batch.label().to_string(), "2024.1");

    let a = register(&conn, "Tea set");
    let b = register(&conn, "Oil lamp");
    let c = register(&conn, "Teapot");
    let d = register(&conn, "Teapot lid");
    link(&conn, c, a, RelationType::PartOf);
    link(&conn, d, a, RelationType::PartOf);

    let alloc_a = service.generate(a).unwrap();
    assert_eq!(alloc_a.object_number, 1);
    assert_eq!(alloc_a.part_number, None);
    assert_eq!(alloc_a.to_string(), "2024.1.1");

    let alloc_b = service.generate(b).unwrap();
    assert_eq!(alloc_b.object_number, 2);
    assert_eq!(alloc_b.part_number, None);

    let alloc_c = service.generate(c).unwrap();
    assert_eq!(alloc_c.object_number, 1);
    assert_eq!(alloc_c.part_number, Some(1));
    assert_eq!(alloc_c.part_count, Some(1));

    let alloc_d = service.generate(d).unwrap();
    assert_eq!(alloc_d.object_number, 1);
    assert_eq!(alloc_d.part_number, Some(2));
    assert_eq!(alloc_d.part_count, Some(2));
    assert_eq!(alloc_d.to_string(), "2024.1.1-2/2");
    assert_eq!(
        alloc_d.confirmation(),
        "Registered accession number 2024.1.1-2/2"
    );

    let reloaded_c = service.get_allocation(c).unwrap().unwrap();
    assert_eq!(reloaded_c.part_count, Some(2));
    assert_eq!(reloaded_c.to_string(), "2024.1.1-1/2");

    // The parent keeps its plain number.
    let reloaded_a = service.get_allocation(a).unwrap().unwrap();
    assert_eq!(reloaded_a, alloc_a);
}

#[test]
fn object_numbers_increase_from_one_and_restart_per_batch() {
    let conn = setup();
    let batches = batch_service(&conn);
    let service = accession_service(&conn);

    batches.start_batch_in_year(2024, false, "").unwrap();
    let first_batch: Vec<u32> = (0..5)
        .map(|index| {
            let work = register(&conn, &format!("Coin {index}"));
            service.generate(work).unwrap().object_number
        })
        .collect();
    assert_eq!(first_batch, vec![1, 2, 3, 4, 5]);

    let second = batches.start_batch_in_year(2024, false, "").unwrap();
    let work = register(&conn, "Medal");
    let allocation = service.generate(work).unwrap();
    assert_eq!(allocation.batch_id, second.batch_id);
    assert_eq!(allocation.object_number, 1);
    assert_eq!(allocation.to_string(), "2024.2.1");
}

#[test]
fn generating_twice_fails_and_keeps_first_allocation() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);
    let work = register(&conn, "Basket");

    let first = service.generate(work).unwrap();
    let err = service.generate(work).unwrap_err();

    assert!(matches!(err, AccessionServiceError::AlreadyAllocated(id) if id == work));
    assert!(!err.is_persistence_failure());
    assert_eq!(service.get_allocation(work).unwrap().unwrap(), first);
    assert_eq!(allocation_count(&conn), 1);
}

#[test]
fn part_of_unallocated_parent_fails_without_writing() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);
    let parent = register(&conn, "Chess set");
    let piece = register(&conn, "Rook");
    link(&conn, piece, parent, RelationType::PartOf);

    let err = service.generate(piece).unwrap_err();

    assert!(matches!(
        err,
        AccessionServiceError::ParentNotAllocated { work_id, parent_id }
            if work_id == piece && parent_id == parent
    ));
    assert!(!service.has_allocation(piece).unwrap());
    assert_eq!(allocation_count(&conn), 0);

    service.generate(parent).unwrap();
    let allocation = service.generate(piece).unwrap();
    assert_eq!(allocation.to_string(), "2024.1.1-1/1");
}

#[test]
fn generate_without_any_batch_fails() {
    let conn = setup();
    let service = accession_service(&conn);
    let work = register(&conn, "Spear head");

    let err = service.generate(work).unwrap_err();

    assert!(matches!(err, AccessionServiceError::NoActiveBatch));
    assert_eq!(allocation_count(&conn), 0);
}

#[test]
fn generate_for_unknown_work_fails() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);

    let err = service.generate(404).unwrap_err();

    assert!(matches!(err, AccessionServiceError::WorkNotFound(404)));
}

#[test]
fn parts_stay_in_parent_batch_after_a_new_batch_starts() {
    let conn = setup();
    let batches = batch_service(&conn);
    let service = accession_service(&conn);

    let old_batch = batches.start_batch_in_year(2023, true, "").unwrap();
    let parent = register(&conn, "Loom");
    let parent_allocation = service.generate(parent).unwrap();
    assert_eq!(parent_allocation.to_string(), "2023.R.1.1");

    batches.start_batch_in_year(2024, false, "").unwrap();
    let shuttle = register(&conn, "Shuttle");
    link(&conn, shuttle, parent, RelationType::PartOf);
    let shuttle_allocation = service.generate(shuttle).unwrap();

    assert_eq!(shuttle_allocation.batch_id, old_batch.batch_id);
    assert_eq!(shuttle_allocation.to_string(), "2023.R.1.1-1/1");

    let other = register(&conn, "Spindle");
    assert_eq!(service.generate(other).unwrap().to_string(), "2024.1.1");
}

#[test]
fn nested_parts_share_root_object_number_and_group_counter() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);

    let cabinet = register(&conn, "Cabinet");
    let drawer = register(&conn, "Drawer");
    let handle = register(&conn, "Drawer handle");
    link(&conn, drawer, cabinet, RelationType::PartOf);
    link(&conn, handle, drawer, RelationType::PartOf);

    service.generate(register(&conn, "Unrelated")).unwrap();
    let cabinet_allocation = service.generate(cabinet).unwrap();
    let drawer_allocation = service.generate(drawer).unwrap();
    let handle_allocation = service.generate(handle).unwrap();

    assert_eq!(cabinet_allocation.object_number, 2);
    assert_eq!(drawer_allocation.object_number, 2);
    assert_eq!(handle_allocation.object_number, 2);
    assert_eq!(handle_allocation.part_number, Some(2));
    assert_eq!(handle_allocation.part_count, Some(2));
    assert_eq!(
        service.get_allocation(drawer).unwrap().unwrap().part_count,
        Some(2)
    );
}

#[test]
fn component_of_gets_its_own_object_number() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);

    let engine = register(&conn, "Engine");
    let piston = register(&conn, "Piston");
    link(&conn, piston, engine, RelationType::ComponentOf);

    // Numbered before the engine: no parent allocation is required.
    let piston_allocation = service.generate(piston).unwrap();
    assert_eq!(piston_allocation.to_string(), "2024.1.1");
    assert!(!piston_allocation.is_part());

    let engine_allocation = service.generate(engine).unwrap();
    assert_eq!(engine_allocation.to_string(), "2024.1.2");

    let valve = register(&conn, "Valve");
    link(&conn, valve, engine, RelationType::ComponentOf);
    assert_eq!(service.generate(valve).unwrap().to_string(), "2024.1.3");
    assert!(service.list_parts(engine_allocation.batch_id, 2).unwrap().is_empty());
}

#[test]
fn formerly_part_of_does_not_share_numbers() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);

    let set = register(&conn, "Dinner service");
    let plate = register(&conn, "Plate");
    link(&conn, plate, set, RelationType::FormerlyPartOf);

    service.generate(set).unwrap();
    let plate_allocation = service.generate(plate).unwrap();

    assert_eq!(plate_allocation.object_number, 2);
    assert!(!plate_allocation.is_part());
}

#[test]
fn all_siblings_report_the_current_part_total() {
    let conn = setup();
    let batches = batch_service(&conn);
    let service = accession_service(&conn);
    let batch = batches.start_batch_in_year(2024, false, "").unwrap();

    let parent = register(&conn, "Necklace");
    service.generate(parent).unwrap();
    for index in 0..6 {
        let bead = register(&conn, &format!("Bead {index}"));
        link(&conn, bead, parent, RelationType::PartOf);
        service.generate(bead).unwrap();
    }

    let parts = service.list_parts(batch.batch_id, 1).unwrap();
    let numbers: Vec<u32> = parts.iter().filter_map(|part| part.part_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    assert!(parts.iter().all(|part| part.part_count == Some(6)));
}

#[test]
fn batch_listing_orders_object_before_its_parts() {
    let conn = setup();
    let batches = batch_service(&conn);
    let service = accession_service(&conn);
    let batch = batches.start_batch_in_year(2024, false, "").unwrap();

    let first = register(&conn, "Drum");
    let second = register(&conn, "Flute");
    let stick = register(&conn, "Drumstick");
    link(&conn, stick, first, RelationType::PartOf);
    service.generate(first).unwrap();
    service.generate(second).unwrap();
    service.generate(stick).unwrap();

    let rendered: Vec<String> = service
        .list_batch_allocations(batch.batch_id)
        .unwrap()
        .iter()
        .map(|allocation| allocation.to_string())
        .collect();
    assert_eq!(rendered, vec!["2024.1.1", "2024.1.1-1/1", "2024.1.2"]);
}

#[test]
fn rendered_numbers_parse_back_to_their_components() {
    let conn = setup();
    let batches = batch_service(&conn);
    let service = accession_service(&conn);
    batches.start_batch_in_year(2019, true, "").unwrap();

    let parent = register(&conn, "Altar piece");
    let mut works = vec![parent, register(&conn, "Candlestick")];
    service.generate(parent).unwrap();
    for index in 0..3 {
        let panel = register(&conn, &format!("Panel {index}"));
        link(&conn, panel, parent, RelationType::PartOf);
        works.push(panel);
    }
    for work in works.iter().skip(1) {
        service.generate(*work).unwrap();
    }

    for work in works {
        let allocation = service.get_allocation(work).unwrap().unwrap();
        let parsed: AccessionNumber = allocation.to_string().parse().unwrap();
        assert_eq!(parsed, allocation.accession_number());
        assert_eq!(parsed.batch, allocation.batch);
        assert_eq!(parsed.object_number, allocation.object_number);
        assert_eq!(parsed.part.map(|part| part.number), allocation.part_number);
        assert_eq!(parsed.part.map(|part| part.count), allocation.part_count);
    }
}

#[test]
fn stored_numbers_cannot_be_rewritten_directly() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);
    let work = register(&conn, "Mask");
    service.generate(work).unwrap();

    let err = conn.execute(
        "UPDATE accession_numbers SET object_number = 7 WHERE work_id = ?1;",
        [work],
    );
    assert!(err.is_err());
    assert_eq!(
        service.get_allocation(work).unwrap().unwrap().object_number,
        1
    );
}

#[test]
fn part_counts_cannot_shrink_or_move_to_objects() {
    let conn = setup();
    batch_service(&conn)
        .start_batch_in_year(2024, false, "")
        .unwrap();
    let service = accession_service(&conn);
    let tray = register(&conn, "Tray");
    let cup = register(&conn, "Cup");
    let lid = register(&conn, "Lid");
    link(&conn, cup, tray, RelationType::PartOf);
    link(&conn, lid, tray, RelationType::PartOf);
    service.generate(tray).unwrap();
    service.generate(cup).unwrap();
    service.generate(lid).unwrap();

    assert!(conn
        .execute(
            "UPDATE accession_numbers SET part_count = 1 WHERE work_id = ?1;",
            [cup]
        )
        .is_err());
    assert!(conn
        .execute(
            "UPDATE accession_numbers SET part_count = 2 WHERE work_id = ?1;",
            [tray]
        )
        .is_err());
    assert_eq!(
        service.get_allocation(cup).unwrap().unwrap().to_string(),
        "2024.1.1-1/2"
    );
    assert_eq!(
        service.get_allocation(tray).unwrap().unwrap().to_string(),
        "2024.1.1"
    );
}
