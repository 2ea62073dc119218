//! Storage layer tests for devices-api.

use devices_core::TokenId;

use super::db::{Database, DatabaseError};
use super::models::{IntegrationStatus, LinkMetadata};
use super::queries::{NewAftermarketDevice, NewUserDevice};
use super::queries_links::StageLink;

async fn test_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

async fn seed_vehicle(db: &Database, id: &str, token: u64) {
    db.create_user_device(NewUserDevice {
        id,
        user_id: "user-1",
        definition_id: "dd-1",
        country_code: Some("USA"),
        ..NewUserDevice::default()
    })
    .await
    .unwrap();
    db.create_vehicle_nft(TokenId::new(token), Some(id), Some("0xowner"))
        .await
        .unwrap();
}

async fn seed_hardware(db: &Database, serial: &str, token: u64) {
    db.create_aftermarket_device(NewAftermarketDevice {
        serial,
        token_id: Some(TokenId::new(token)),
        ethereum_address: Some("0xhw"),
        ..NewAftermarketDevice::default()
    })
    .await
    .unwrap();
}

fn stage<'a>(user_device_id: &'a str, serial: &'a str, metadata: Option<&'a str>) -> StageLink<'a> {
    StageLink {
        user_device_id,
        integration_id: "int-autopi",
        external_id: Some(serial),
        serial,
        status: IntegrationStatus::Pending,
        metadata,
        vehicle_token_id: TokenId::new(57),
    }
}

// === Vehicle tests ===

#[tokio::test]
async fn vehicle_by_token_loads_user_device() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;

    let vehicle = db.get_vehicle_by_token(TokenId::new(57)).await.unwrap();
    assert_eq!(vehicle.nft.token_id, "57");
    assert_eq!(vehicle.user_device.unwrap().id, "ud1");
}

#[tokio::test]
async fn deleted_user_device_detaches_vehicle() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;

    assert!(db.delete_user_device("ud1").await.unwrap());

    let vehicle = db.get_vehicle_by_token(TokenId::new(57)).await.unwrap();
    assert!(vehicle.nft.user_device_id.is_none());
    assert!(vehicle.user_device.is_none());
}

#[tokio::test]
async fn unknown_vehicle_token_is_not_found() {
    let db = test_db().await;
    let err = db.get_vehicle_by_token(TokenId::new(1)).await.unwrap_err();
    assert!(err.is_not_found());
}

// === Aftermarket device tests ===

#[tokio::test]
async fn aftermarket_device_by_token() {
    let db = test_db().await;
    seed_hardware(&db, "unit1", 0).await;

    let device = db.get_aftermarket_device_by_token(TokenId::new(0)).await.unwrap();
    assert_eq!(device.serial, "unit1");
    assert_eq!(device.ethereum_address.as_deref(), Some("0xhw"));
    assert!(device.vehicle_token_id.is_none());

    assert!(db.get_aftermarket_device_by_token(TokenId::new(9)).await.is_err());
}

#[tokio::test]
async fn duplicate_hardware_token_conflicts() {
    let db = test_db().await;
    seed_hardware(&db, "unit1", 3).await;

    let err = db
        .create_aftermarket_device(NewAftermarketDevice {
            serial: "unit2",
            token_id: Some(TokenId::new(3)),
            ..NewAftermarketDevice::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)));
}

// === Integration link tests ===

#[tokio::test]
async fn stage_link_inserts_and_pairs_hardware() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;
    seed_hardware(&db, "unit1", 0).await;

    let (link, replaced) = db
        .stage_integration_link(stage("ud1", "unit1", Some("{}")))
        .await
        .unwrap();

    assert!(!replaced);
    assert_eq!(link.status, "Pending");
    assert_eq!(link.external_id.as_deref(), Some("unit1"));

    let device = db.get_aftermarket_device("unit1").await.unwrap();
    assert_eq!(device.vehicle_token_id.as_deref(), Some("57"));
}

#[tokio::test]
async fn restaging_replaces_previous_link() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;
    seed_hardware(&db, "unit1", 0).await;

    db.stage_integration_link(stage("ud1", "unit1", Some(r#"{"autoPiTemplateApplied":1}"#)))
        .await
        .unwrap();
    let (_, replaced) = db
        .stage_integration_link(stage("ud1", "unit1", Some(r#"{"autoPiTemplateApplied":2}"#)))
        .await
        .unwrap();
    assert!(replaced);

    let links = db.list_integration_links("ud1").await.unwrap();
    assert_eq!(links.len(), 1);
    let md = links[0].parsed_metadata().unwrap();
    assert_eq!(md.autopi_template_applied, Some(2));
}

#[tokio::test]
async fn staging_for_unknown_hardware_rolls_back() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;

    let err = db
        .stage_integration_link(stage("ud1", "ghost", None))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(db.get_integration_link("ud1", "int-autopi").await.unwrap().is_none());
}

#[tokio::test]
async fn update_link_status_and_metadata() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;
    seed_hardware(&db, "unit1", 0).await;
    db.stage_integration_link(stage("ud1", "unit1", None)).await.unwrap();

    let md = LinkMetadata {
        autopi_registration_error: Some("boom".into()),
        ..LinkMetadata::default()
    }
    .to_json()
    .unwrap();
    assert!(
        db.update_integration_link("ud1", "int-autopi", IntegrationStatus::Failed, Some(&md))
            .await
            .unwrap()
    );

    let link = db.get_integration_link("ud1", "int-autopi").await.unwrap().unwrap();
    assert_eq!(link.status, "Failed");
    assert_eq!(
        link.parsed_metadata().unwrap().autopi_registration_error.as_deref(),
        Some("boom")
    );

    assert!(
        !db.update_integration_link_metadata("ud1", "other", "{}")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn link_by_external_id() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;
    seed_hardware(&db, "unit1", 0).await;
    db.stage_integration_link(stage("ud1", "unit1", None)).await.unwrap();

    let link = db.get_integration_link_by_external_id("ud1", "unit1").await.unwrap();
    assert_eq!(link.integration_id, "int-autopi");
    assert!(db.get_integration_link_by_external_id("ud1", "unit2").await.is_err());
}

#[tokio::test]
async fn remove_link_clears_pairing_and_tolerates_absence() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;
    seed_hardware(&db, "unit1", 0).await;
    db.stage_integration_link(stage("ud1", "unit1", None)).await.unwrap();

    let vehicle = TokenId::new(57);
    assert!(db.remove_integration_link("ud1", "int-autopi", "unit1", vehicle).await.unwrap());
    assert!(!db.remove_integration_link("ud1", "int-autopi", "unit1", vehicle).await.unwrap());

    let device = db.get_aftermarket_device("unit1").await.unwrap();
    assert!(device.vehicle_token_id.is_none());
}

#[tokio::test]
async fn remove_link_keeps_pairing_with_another_vehicle() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;
    seed_vehicle(&db, "ud2", 58).await;
    seed_hardware(&db, "unit1", 0).await;
    db.stage_integration_link(stage("ud1", "unit1", None)).await.unwrap();

    assert!(
        !db.remove_integration_link("ud2", "int-autopi", "unit1", TokenId::new(58))
            .await
            .unwrap()
    );

    let device = db.get_aftermarket_device("unit1").await.unwrap();
    assert_eq!(device.vehicle_token_id.as_deref(), Some("57"));
    assert!(db.get_integration_link("ud1", "int-autopi").await.unwrap().is_some());
}

#[tokio::test]
async fn restage_with_new_hardware_releases_old_hardware() {
    let db = test_db().await;
    seed_vehicle(&db, "ud1", 57).await;
    seed_hardware(&db, "unitA", 0).await;
    seed_hardware(&db, "unitB", 5).await;

    db.stage_integration_link(stage("ud1", "unitA", None)).await.unwrap();
    let (link, replaced) = db.stage_integration_link(stage("ud1", "unitB", None)).await.unwrap();
    assert!(replaced);
    assert_eq!(link.serial.as_deref(), Some("unitB"));

    let old = db.get_aftermarket_device("unitA").await.unwrap();
    let new = db.get_aftermarket_device("unitB").await.unwrap();
    assert!(old.vehicle_token_id.is_none());
    assert_eq!(new.vehicle_token_id.as_deref(), Some("57"));
}

// === AutoPi job tests ===

#[tokio::test]
async fn create_and_get_autopi_job() {
    let db = test_db().await;
    let job = db
        .create_autopi_job("jid-1", "dev1", "state.sls pending", Some("ud1"))
        .await
        .unwrap();
    assert_eq!(job.state, "Sent");
    assert_eq!(job.device_id, "dev1");
    assert!(db.get_autopi_job("jid-2").await.is_err());
}
