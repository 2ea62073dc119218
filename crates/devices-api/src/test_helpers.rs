//! In-memory collaborators and fixtures shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devices_core::TokenId;

use crate::autopi::{AutoPiApi, AutoPiError, DongleDevice, DongleVehicle, VehicleProfile};
use crate::definitions::{
    AUTOPI_VENDOR, DefinitionsError, DeviceDefinition, DeviceDefinitionLookup, DeviceMake,
    IntegrationDescriptor, MACARON_VENDOR,
};
use crate::pairing::Collaborators;
use crate::sinks::{
    CloudEvent, DeviceDefinitionRegistrar, DeviceVehicleMapping, EventEmitter, IngestRegistrar,
    IntegrationEventData, RegistrarDto, SinkError,
};
use crate::storage::{Database, NewAftermarketDevice, NewUserDevice};

pub const VEHICLE_TOKEN: u64 = 57;
pub const HARDWARE_TOKEN: u64 = 0;
pub const MANUFACTURER_TOKEN: u64 = 142;
pub const USER_DEVICE_ID: &str = "ud1";
pub const UNIT_ID: &str = "unit1";
pub const DONGLE_ID: &str = "dev1";

pub fn autopi_integration() -> IntegrationDescriptor {
    IntegrationDescriptor {
        id: "int-autopi".into(),
        vendor: AUTOPI_VENDOR.into(),
        kind: "Hardware".into(),
        style: "Addon".into(),
        autopi_default_template_id: 0,
        autopi_powertrain_template: None,
        manufacturer_token_id: None,
    }
}

pub fn generic_integration() -> IntegrationDescriptor {
    IntegrationDescriptor {
        id: "int-generic".into(),
        vendor: "Hashdog".into(),
        manufacturer_token_id: Some(TokenId::new(MANUFACTURER_TOKEN)),
        ..autopi_integration()
    }
}

pub fn macaron_integration() -> IntegrationDescriptor {
    IntegrationDescriptor {
        id: "int-macaron".into(),
        vendor: MACARON_VENDOR.into(),
        ..autopi_integration()
    }
}

pub fn mach_e() -> DeviceDefinition {
    DeviceDefinition {
        id: "dd1".into(),
        year: 2020,
        make: DeviceMake {
            id: "ford".into(),
            name: "Ford".into(),
            name_slug: "ford".into(),
            hardware_template_id: None,
        },
        model: "Mach-E".into(),
        model_slug: "mach-e".into(),
        hardware_template_id: Some("1".into()),
        device_styles: Vec::new(),
    }
}

/// Vehicle token 57 owned by `ud1`, hardware token 0 with serial `unit1`.
pub async fn seeded_db() -> Database {
    let db = Database::open_in_memory().await.unwrap();
    db.create_user_device(NewUserDevice {
        id: USER_DEVICE_ID,
        user_id: "user-1",
        definition_id: "dd1",
        name: Some("My Car"),
        vin: Some("1FMCU0G61MUA00001"),
        country_code: Some("USA"),
        ..NewUserDevice::default()
    })
    .await
    .unwrap();
    db.create_vehicle_nft(TokenId::new(VEHICLE_TOKEN), Some(USER_DEVICE_ID), Some("0xowner"))
        .await
        .unwrap();
    db.create_aftermarket_device(NewAftermarketDevice {
        serial: UNIT_ID,
        token_id: Some(TokenId::new(HARDWARE_TOKEN)),
        ethereum_address: Some("0xhw"),
        owner_address: Some("0xowner"),
        device_manufacturer_token_id: Some(TokenId::new(MANUFACTURER_TOKEN)),
        ..NewAftermarketDevice::default()
    })
    .await
    .unwrap();
    db
}

pub struct FakeDefinitions {
    pub integrations: Mutex<Vec<IntegrationDescriptor>>,
    pub definitions: Mutex<Vec<DeviceDefinition>>,
}

impl Default for FakeDefinitions {
    fn default() -> Self {
        Self {
            integrations: Mutex::new(vec![
                autopi_integration(),
                generic_integration(),
                macaron_integration(),
            ]),
            definitions: Mutex::new(vec![mach_e()]),
        }
    }
}

#[async_trait]
impl DeviceDefinitionLookup for FakeDefinitions {
    async fn get_integrations(&self) -> Result<Vec<IntegrationDescriptor>, DefinitionsError> {
        Ok(self.integrations.lock().unwrap().clone())
    }

    async fn get_device_definition_by_id(
        &self,
        id: &str,
    ) -> Result<DeviceDefinition, DefinitionsError> {
        self.definitions
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| DefinitionsError::NotFound(format!("device definition {id}")))
    }
}

/// Records every call; `fail_on` makes the named operation return an error.
pub struct FakeAutoPi {
    pub device: Mutex<DongleDevice>,
    pub calls: Mutex<Vec<String>>,
    pub fail_on: Mutex<Option<&'static str>>,
    jobs: AtomicUsize,
}

impl Default for FakeAutoPi {
    fn default() -> Self {
        Self {
            device: Mutex::new(DongleDevice {
                id: DONGLE_ID.into(),
                unit_id: UNIT_ID.into(),
                imei: "867000000000001".into(),
                template: 0,
                vehicle: DongleVehicle {
                    id: 31,
                    ..DongleVehicle::default()
                },
            }),
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            jobs: AtomicUsize::new(0),
        }
    }
}

impl FakeAutoPi {
    pub fn failing(op: &'static str) -> Self {
        let fake = Self::default();
        *fake.fail_on.lock().unwrap() = Some(op);
        fake
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, call: String) -> Result<(), AutoPiError> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(op) {
            return Err(AutoPiError::Api {
                status: 500,
                message: format!("{op} unavailable"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AutoPiApi for FakeAutoPi {
    async fn get_device_by_unit_id(&self, unit_id: &str) -> Result<DongleDevice, AutoPiError> {
        self.record("get_device", format!("get_device {unit_id}"))?;
        Ok(self.device.lock().unwrap().clone())
    }

    async fn patch_vehicle_profile(
        &self,
        vehicle_id: i64,
        profile: &VehicleProfile,
    ) -> Result<(), AutoPiError> {
        self.record(
            "patch",
            format!("patch {vehicle_id} {:?} {:?}", profile.year, profile.call_name),
        )
    }

    async fn unassociate_device_template(
        &self,
        device_id: &str,
        template_id: i64,
    ) -> Result<(), AutoPiError> {
        self.record("unassociate", format!("unassociate {device_id} {template_id}"))
    }

    async fn associate_device_to_template(
        &self,
        device_id: &str,
        template_id: i64,
    ) -> Result<(), AutoPiError> {
        self.record("associate", format!("associate {device_id} {template_id}"))
    }

    async fn apply_template(&self, device_id: &str, template_id: i64) -> Result<(), AutoPiError> {
        self.record("apply", format!("apply {device_id} {template_id}"))
    }

    async fn execute_raw_command(
        &self,
        device_id: &str,
        command: &str,
    ) -> Result<String, AutoPiError> {
        self.record("command", format!("command {device_id} {command}"))?;
        let n = self.jobs.fetch_add(1, Ordering::SeqCst);
        Ok(format!("job-{n}"))
    }
}

fn rejected(fail: &AtomicBool, what: &str) -> Result<(), SinkError> {
    if fail.load(Ordering::SeqCst) {
        return Err(SinkError::Api {
            status: 503,
            body: format!("{what} unavailable"),
        });
    }
    Ok(())
}

#[derive(Default)]
pub struct RecordingIngest {
    pub registered: Mutex<Vec<(String, String, String)>>,
    pub mappings: Mutex<Vec<DeviceVehicleMapping>>,
    pub deregistered: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl IngestRegistrar for RecordingIngest {
    async fn register(
        &self,
        unit_id: &str,
        vehicle_id: &str,
        integration_id: &str,
    ) -> Result<(), SinkError> {
        rejected(&self.fail, "ingest")?;
        self.registered.lock().unwrap().push((
            unit_id.to_string(),
            vehicle_id.to_string(),
            integration_id.to_string(),
        ));
        Ok(())
    }

    async fn register_mapping(&self, mapping: &DeviceVehicleMapping) -> Result<(), SinkError> {
        rejected(&self.fail, "ingest")?;
        self.mappings.lock().unwrap().push(mapping.clone());
        Ok(())
    }

    async fn deregister(
        &self,
        device_id: &str,
        _vehicle_id: &str,
        _integration_id: &str,
    ) -> Result<(), SinkError> {
        rejected(&self.fail, "ingest")?;
        self.deregistered.lock().unwrap().push(device_id.to_string());
        Ok(())
    }

    async fn deregister_address(&self, hardware_address: &str) -> Result<(), SinkError> {
        rejected(&self.fail, "ingest")?;
        self.deregistered
            .lock()
            .unwrap()
            .push(hardware_address.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmitter {
    pub events: Mutex<Vec<CloudEvent<IntegrationEventData>>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl EventEmitter for RecordingEmitter {
    async fn emit(&self, event: &CloudEvent<IntegrationEventData>) -> Result<(), SinkError> {
        rejected(&self.fail, "events")?;
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRegistrar {
    pub registered: Mutex<Vec<RegistrarDto>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl DeviceDefinitionRegistrar for RecordingRegistrar {
    async fn register(&self, dto: &RegistrarDto) -> Result<(), SinkError> {
        rejected(&self.fail, "registrar")?;
        self.registered.lock().unwrap().push(dto.clone());
        Ok(())
    }
}

/// Collaborators plus handles to the recording fakes behind them.
pub struct Harness {
    pub db: Database,
    pub definitions: Arc<FakeDefinitions>,
    pub autopi: Arc<FakeAutoPi>,
    pub ingest: Arc<RecordingIngest>,
    pub events: Arc<RecordingEmitter>,
    pub registrar: Arc<RecordingRegistrar>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_autopi(FakeAutoPi::default()).await
    }

    pub async fn with_autopi(autopi: FakeAutoPi) -> Self {
        Self {
            db: seeded_db().await,
            definitions: Arc::new(FakeDefinitions::default()),
            autopi: Arc::new(autopi),
            ingest: Arc::new(RecordingIngest::default()),
            events: Arc::new(RecordingEmitter::default()),
            registrar: Arc::new(RecordingRegistrar::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            db: self.db.clone(),
            definitions: self.definitions.clone(),
            ingest: self.ingest.clone(),
            events: self.events.clone(),
            dd_registrar: self.registrar.clone(),
        }
    }
}
