//! Test fixtures: entity types and a ready-made recorder.

use std::any::Any;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use chronicle_audit::{
    Entity, EntitySchema, EventRecorder, FieldError, FieldKind, FieldValue, RecorderOptions,
    TypeRegistry,
};

use crate::mocks::{MemoryEntityStore, RecordingEventStore, StaticActor};

/// Actor id reported by [`test_recorder`].
pub const TEST_ACTOR_ID: &str = "tester";

/// Actor address reported by [`test_recorder`].
pub const TEST_ACTOR_IP: &str = "127.0.0.1";

/// A customer carrying one field of every primitive kind, plus an unlogged
/// and a computed field.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    /// Identity.
    pub id: Uuid,
    /// Text.
    pub name: String,
    /// Boolean.
    pub active: bool,
    /// Integer.
    pub visits: i64,
    /// Decimal.
    pub balance: f64,
    /// Date/time.
    pub joined: Option<DateTime<Utc>>,
    /// Identifier.
    pub account: Option<Uuid>,
    /// Identifier list.
    pub referrals: Vec<Uuid>,
    /// Text list.
    pub tags: Vec<String>,
    /// Never audited.
    pub password_hash: String,
}

static CUSTOMER: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("crm.Customer", || Box::new(Customer::blank()))
        .field("name", FieldKind::Text)
        .field("active", FieldKind::Bool)
        .field("visits", FieldKind::Integer)
        .field("balance", FieldKind::Decimal)
        .field("joined", FieldKind::DateTime)
        .field("account", FieldKind::Id)
        .field("referrals", FieldKind::IdList)
        .field("tags", FieldKind::TextList)
        .unlogged("password_hash", FieldKind::Text)
        .computed("display_name", FieldKind::Text)
        .build()
        .expect("valid customer schema")
});

impl Customer {
    /// An empty customer with a fresh id.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            active: false,
            visits: 0,
            balance: 0.0,
            joined: None,
            account: None,
            referrals: Vec::new(),
            tags: Vec::new(),
            password_hash: String::new(),
        }
    }

    /// A customer with every field populated.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Ada <Lovelace> & \"Co\"".to_owned(),
            active: true,
            visits: 42,
            balance: 1234.5,
            joined: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).single(),
            account: Some(Uuid::new_v4()),
            referrals: vec![Uuid::new_v4(), Uuid::new_v4()],
            tags: vec!["gold".to_owned(), "early-adopter".to_owned()],
            password_hash: "argon2$secret".to_owned(),
        }
    }
}

impl Entity for Customer {
    fn schema(&self) -> &'static EntitySchema {
        &CUSTOMER
    }

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn set_key(&mut self, key: &str) -> Result<(), FieldError> {
        self.id = Uuid::parse_str(key).map_err(|_| FieldError::InvalidKey(key.to_owned()))?;
        Ok(())
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        Ok(match name {
            "name" => self.name.clone().into(),
            "active" => self.active.into(),
            "visits" => self.visits.into(),
            "balance" => self.balance.into(),
            "joined" => self.joined.into(),
            "account" => self.account.into(),
            "referrals" => FieldValue::IdList(self.referrals.clone()),
            "tags" => FieldValue::TextList(self.tags.clone()),
            "password_hash" => self.password_hash.clone().into(),
            "display_name" => format!("{} ({})", self.name, self.visits).into(),
            _ => return Err(FieldError::Unknown(name.to_owned())),
        })
    }

    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError> {
        match (name, value) {
            ("name", FieldValue::Text(v)) => self.name = v,
            ("active", FieldValue::Bool(v)) => self.active = v,
            ("visits", FieldValue::Integer(v)) => self.visits = v,
            ("balance", FieldValue::Decimal(v)) => self.balance = v,
            ("joined", FieldValue::DateTime(v)) => self.joined = Some(v),
            ("joined", FieldValue::Null) => self.joined = None,
            ("account", FieldValue::Id(v)) => self.account = Some(v),
            ("account", FieldValue::Null) => self.account = None,
            ("referrals", FieldValue::IdList(v)) => self.referrals = v,
            ("tags", FieldValue::TextList(v)) => self.tags = v,
            ("password_hash", FieldValue::Text(v)) => self.password_hash = v,
            (
                "name" | "active" | "visits" | "balance" | "joined" | "account" | "referrals"
                | "tags" | "password_hash",
                other,
            ) => return Err(FieldError::rejected(name, &other)),
            _ => return Err(FieldError::Unknown(name.to_owned())),
        }
        Ok(())
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A customer subtype that inherits every [`Customer`] field and redeclares
/// `name` as its own.
#[derive(Debug, Clone, PartialEq)]
pub struct VipCustomer {
    /// Inherited state.
    pub base: Customer,
    /// Shadows the inherited `name`.
    pub name: String,
    /// Own field.
    pub tier: Option<String>,
}

static VIP_CUSTOMER: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("crm.VipCustomer", || Box::new(VipCustomer::blank()))
        .inherit(&CUSTOMER)
        .field("name", FieldKind::Text)
        .field("tier", FieldKind::Text)
        .build()
        .expect("valid vip customer schema")
});

impl VipCustomer {
    /// An empty VIP customer with a fresh id.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            base: Customer::blank(),
            name: String::new(),
            tier: None,
        }
    }
}

impl Entity for VipCustomer {
    fn schema(&self) -> &'static EntitySchema {
        &VIP_CUSTOMER
    }

    fn key(&self) -> String {
        self.base.key()
    }

    fn set_key(&mut self, key: &str) -> Result<(), FieldError> {
        self.base.set_key(key)
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "name" => Ok(self.name.clone().into()),
            "tier" => Ok(self.tier.clone().into()),
            _ => self.base.read_field(name),
        }
    }

    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError> {
        match (name, value) {
            ("name", FieldValue::Text(v)) => self.name = v,
            ("tier", FieldValue::Text(v)) => self.tier = (!v.is_empty()).then_some(v),
            ("tier", FieldValue::Null) => self.tier = None,
            ("name" | "tier", other) => return Err(FieldError::rejected(name, &other)),
            (_, other) => return self.base.write_field(name, other),
        }
        Ok(())
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type that opts out of auditing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionToken {
    /// Identity.
    pub id: String,
    /// Opaque token.
    pub token: String,
}

static SESSION_TOKEN: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("auth.SessionToken", || Box::new(SessionToken::default()))
        .not_audited()
        .field("token", FieldKind::Text)
        .build()
        .expect("valid session token schema")
});

impl Entity for SessionToken {
    fn schema(&self) -> &'static EntitySchema {
        &SESSION_TOKEN
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn set_key(&mut self, key: &str) -> Result<(), FieldError> {
        key.clone_into(&mut self.id);
        Ok(())
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "token" => Ok(self.token.clone().into()),
            _ => Err(FieldError::Unknown(name.to_owned())),
        }
    }

    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError> {
        match (name, value) {
            ("token", FieldValue::Text(v)) => self.token = v,
            ("token", other) => return Err(FieldError::rejected(name, &other)),
            _ => return Err(FieldError::Unknown(name.to_owned())),
        }
        Ok(())
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A device whose `reading` cannot be read while it is faulty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sensor {
    /// Identity.
    pub id: i64,
    /// Label.
    pub label: String,
    /// Last reading.
    pub reading: Option<i64>,
    /// When set, reading `reading` fails.
    pub faulty: bool,
}

static SENSOR: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::builder("iot.Sensor", || Box::new(Sensor::default()))
        .field("label", FieldKind::Text)
        .field("reading", FieldKind::Integer)
        .build()
        .expect("valid sensor schema")
});

impl Entity for Sensor {
    fn schema(&self) -> &'static EntitySchema {
        &SENSOR
    }

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn set_key(&mut self, key: &str) -> Result<(), FieldError> {
        self.id = key
            .parse()
            .map_err(|_| FieldError::InvalidKey(key.to_owned()))?;
        Ok(())
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "label" => Ok(self.label.clone().into()),
            "reading" if self.faulty => Err(FieldError::Unreadable {
                field: name.to_owned(),
                reason: "sensor offline".to_owned(),
            }),
            "reading" => Ok(self.reading.into()),
            _ => Err(FieldError::Unknown(name.to_owned())),
        }
    }

    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError> {
        match (name, value) {
            ("label", FieldValue::Text(v)) => self.label = v,
            ("reading", FieldValue::Integer(v)) => self.reading = Some(v),
            ("reading", FieldValue::Null) => self.reading = None,
            ("label" | "reading", other) => return Err(FieldError::rejected(name, &other)),
            _ => return Err(FieldError::Unknown(name.to_owned())),
        }
        Ok(())
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Register every fixture type.
pub fn register_fixtures(registry: &TypeRegistry) {
    registry.register(&CUSTOMER);
    registry.register(&VIP_CUSTOMER);
    registry.register(&SESSION_TOKEN);
    registry.register(&SENSOR);
}

/// A registry holding every fixture type.
#[must_use]
pub fn test_registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    register_fixtures(&registry);
    Arc::new(registry)
}

/// A recorder over the given stores, reporting [`TEST_ACTOR_ID`] from
/// [`TEST_ACTOR_IP`].
#[must_use]
pub fn test_recorder(
    events: &Arc<RecordingEventStore>,
    entities: &Arc<MemoryEntityStore>,
    options: RecorderOptions,
) -> EventRecorder {
    EventRecorder::builder(Arc::clone(events) as _, Arc::clone(entities) as _)
        .actors(Arc::new(StaticActor::new(Some(TEST_ACTOR_ID), Some(TEST_ACTOR_IP))))
        .options(options)
        .build()
}
