use crate::{
    auth::{
        password::{hash_password, verify_password},
        AuthUser,
    },
    db::DatabaseAccess,
    entities::{branch, driver, user, UserProfile},
    errors::{validation_messages, ServiceError},
    events::{Event, EventSender},
    services::{find_branch_for_user, find_driver_for_user, geocoding::GeocodingClient},
    validation::{decode_avatar, encode_avatar, is_valid_cnpj, is_valid_cpf, EMAIL_RE},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Postal address of a branch or driver
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub complement: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    fn is_empty(&self) -> bool {
        [
            &self.street,
            &self.number,
            &self.neighborhood,
            &self.city,
            &self.state,
            &self.complement,
            &self.zip_code,
        ]
        .iter()
        .all(|field| field.as_deref().map_or(true, |v| v.trim().is_empty()))
    }

    fn is_complete(&self) -> bool {
        [
            &self.street,
            &self.number,
            &self.neighborhood,
            &self.city,
            &self.state,
            &self.zip_code,
        ]
        .iter()
        .all(|field| field.as_deref().map_or(false, |v| !v.trim().is_empty()))
    }
}

fn pick(new: &Option<String>, current: &str) -> String {
    new.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(current)
        .to_string()
}

/// Geocoding query for a branch, `"{street}, {number}, {neighborhood}, {city}, {state}, {zip}"`
fn geocoding_query(street: &str, number: &str, neighborhood: &str, city: &str, state: &str, zip: &str) -> String {
    format!(
        "{}, {}, {}, {}, {}, {}",
        street, number, neighborhood, city, state, zip
    )
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 240, message = "Name is invalid."))]
    pub name: String,
    pub profile: String,
    #[validate(regex(path = "EMAIL_RE", message = "Email is invalid."))]
    pub email: String,
    #[validate(length(min = 6, max = 20, message = "Password is invalid."))]
    pub password: String,
    pub document: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    /// Base64, optionally with a data URI prefix
    pub avatar: Option<String>,
}

impl NewUser {
    /// All rule violations, field rules first, then profile-specific rules
    fn violations(&self) -> (Vec<String>, Option<UserProfile>) {
        let mut messages = match self.validate() {
            Ok(()) => Vec::new(),
            Err(e) => validation_messages(&e),
        };

        let profile = UserProfile::from_str(self.profile.trim()).ok();
        if profile.is_none() {
            messages.push("Profile is invalid.".to_string());
        }

        match self.document.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => messages.push("Document is invalid.".to_string()),
            Some(doc) if profile == Some(UserProfile::Driver) && !is_valid_cpf(doc) => {
                messages.push("CPF is invalid.".to_string())
            }
            Some(doc) if profile == Some(UserProfile::Branch) && !is_valid_cnpj(doc) => {
                messages.push("CNPJ is invalid.".to_string())
            }
            Some(_) => {}
        }

        if matches!(profile, Some(UserProfile::Driver) | Some(UserProfile::Branch))
            && !self.address.is_complete()
        {
            messages.push("Address is incomplete.".to_string());
        }

        (messages, profile)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserChanges {
    #[validate(length(min = 3, max = 240, message = "Name is invalid."))]
    pub name: Option<String>,
    #[validate(regex(path = "EMAIL_RE", message = "Email is invalid."))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 20, message = "Password is invalid."))]
    pub password: Option<String>,
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub address: Address,
}

/// Entry of `GET /users`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub status: bool,
    pub profile: UserProfile,
    pub avatar: Option<String>,
}

impl From<user::Model> for UserSummary {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            avatar: encode_avatar(model.avatar.as_deref()),
            name: model.name,
            status: model.status,
            profile: model.profile,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserDetails {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: bool,
    pub full_address: Option<String>,
    pub profile: UserProfile,
    pub avatar: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseAccess>,
    event_sender: Arc<EventSender>,
    geocoder: Arc<dyn GeocodingClient>,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseAccess>,
        event_sender: Arc<EventSender>,
        geocoder: Arc<dyn GeocodingClient>,
    ) -> Self {
        Self {
            db,
            event_sender,
            geocoder,
        }
    }

    /// Creates the account and, for BRANCH and DRIVER, its profile row in one
    /// transaction. Branch coordinates are looked up beforehand and left
    /// empty when the lookup fails.
    #[instrument(skip(self, input), fields(email = %input.email, profile = %input.profile))]
    pub async fn create_user(&self, input: NewUser) -> Result<user::Model, ServiceError> {
        let (violations, profile) = input.violations();
        let profile = match (violations.is_empty(), profile) {
            (true, Some(profile)) => profile,
            _ => return Err(ServiceError::ValidationError(violations.join(" "))),
        };

        let email = input.email.trim().to_lowercase();
        let conn = self.db.pool();
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if taken.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let avatar = input.avatar.as_deref().map(decode_avatar).transpose()?;
        let password_hash = hash_password(&input.password)?;
        let document = input.document.unwrap_or_default().trim().to_string();
        let address = input.address;
        let field = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();

        let coordinates = if profile == UserProfile::Branch {
            let query = geocoding_query(
                &field(&address.street),
                &field(&address.number),
                &field(&address.neighborhood),
                &field(&address.city),
                &field(&address.state),
                &field(&address.zip_code),
            );
            let found = self.geocoder.coordinates_for(&query).await;
            if found.is_none() {
                warn!("branch created without coordinates");
            }
            found
        } else {
            None
        };

        let name = input.name.trim().to_string();
        let created = self
            .db
            .transaction("create_user", move |txn| {
                Box::pin(async move {
                    let user = user::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        name: Set(name),
                        email: Set(email),
                        password_hash: Set(password_hash),
                        profile: Set(profile),
                        status: Set(true),
                        avatar: Set(avatar),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(map_unique_email)?;

                    let complement = address
                        .complement
                        .as_deref()
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string);

                    match profile {
                        UserProfile::Driver => {
                            driver::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                user_id: Set(user.id),
                                document: Set(document),
                                street: Set(field(&address.street)),
                                number: Set(field(&address.number)),
                                neighborhood: Set(field(&address.neighborhood)),
                                city: Set(field(&address.city)),
                                state: Set(field(&address.state)),
                                complement: Set(complement),
                                zip_code: Set(field(&address.zip_code)),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        }
                        UserProfile::Branch => {
                            branch::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                user_id: Set(user.id),
                                document: Set(document),
                                street: Set(field(&address.street)),
                                number: Set(field(&address.number)),
                                neighborhood: Set(field(&address.neighborhood)),
                                city: Set(field(&address.city)),
                                state: Set(field(&address.state)),
                                complement: Set(complement),
                                zip_code: Set(field(&address.zip_code)),
                                latitude: Set(coordinates.map(|c| c.lat)),
                                longitude: Set(coordinates.map(|c| c.lng)),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        }
                        UserProfile::Admin => {}
                    }

                    Ok(user)
                })
            })
            .await?;

        info!(user_id = %created.id, "user created");
        self.event_sender
            .send_or_log(Event::UserCreated {
                user_id: created.id,
                profile: created.profile,
            })
            .await;

        Ok(created)
    }

    /// Users, optionally restricted to one profile
    #[instrument(skip(self))]
    pub async fn list_users(&self, profile: Option<&str>) -> Result<Vec<UserSummary>, ServiceError> {
        let mut query = user::Entity::find().order_by_asc(user::Column::Name);
        if let Some(raw) = profile.filter(|p| !p.is_empty()) {
            let profile = UserProfile::from_str(raw)
                .map_err(|_| ServiceError::ValidationError("Profile is invalid.".to_string()))?;
            query = query.filter(user::Column::Profile.eq(profile));
        }

        let users = query
            .all(self.db.pool())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn get_user(&self, caller: &AuthUser, user_id: Uuid) -> Result<UserDetails, ServiceError> {
        ensure_admin_or_self(caller, user_id)?;
        let user = self.find_user(user_id).await?;
        self.details(user).await
    }

    /// Applies profile changes. Address fields are only accepted for
    /// accounts that have an address; a branch address change refreshes the
    /// coordinates.
    #[instrument(skip(self, caller, changes), fields(caller = %caller.user_id))]
    pub async fn update_user(
        &self,
        caller: &AuthUser,
        user_id: Uuid,
        changes: UserChanges,
    ) -> Result<UserDetails, ServiceError> {
        ensure_admin_or_self(caller, user_id)?;
        changes.validate()?;

        let conn = self.db.pool();
        let existing = self.find_user(user_id).await?;

        if existing.profile == UserProfile::Admin && !changes.address.is_empty() {
            return Err(ServiceError::BadRequest(
                "Administrators have no address".to_string(),
            ));
        }

        let email = changes.email.as_deref().map(|e| e.trim().to_lowercase());
        if let Some(email) = email.as_ref().filter(|e| **e != existing.email) {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email.clone()))
                .one(conn)
                .await
                .map_err(ServiceError::db_error)?;
            if taken.is_some() {
                return Err(ServiceError::Conflict("Email already registered".to_string()));
            }
        }

        let password_hash = changes.password.as_deref().map(hash_password).transpose()?;
        let avatar = changes
            .avatar
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(decode_avatar)
            .transpose()?;

        let branch = find_branch_for_user(conn, user_id).await?;
        let driver = find_driver_for_user(conn, user_id).await?;
        let address = changes.address;

        let branch_update = match branch {
            Some(current) if !address.is_empty() => {
                let mut active: branch::ActiveModel = current.clone().into();
                let street = pick(&address.street, &current.street);
                let number = pick(&address.number, &current.number);
                let neighborhood = pick(&address.neighborhood, &current.neighborhood);
                let city = pick(&address.city, &current.city);
                let state = pick(&address.state, &current.state);
                let zip_code = pick(&address.zip_code, &current.zip_code);
                let coordinates = self
                    .geocoder
                    .coordinates_for(&geocoding_query(
                        &street,
                        &number,
                        &neighborhood,
                        &city,
                        &state,
                        &zip_code,
                    ))
                    .await;
                if let Some(found) = coordinates {
                    active.latitude = Set(Some(found.lat));
                    active.longitude = Set(Some(found.lng));
                }
                active.street = Set(street);
                active.number = Set(number);
                active.neighborhood = Set(neighborhood);
                active.city = Set(city);
                active.state = Set(state);
                active.zip_code = Set(zip_code);
                if let Some(complement) = address.complement.clone().filter(|c| !c.trim().is_empty()) {
                    active.complement = Set(Some(complement));
                }
                Some(active)
            }
            _ => None,
        };

        let driver_update = match driver {
            Some(current) if !address.is_empty() => {
                let mut active: driver::ActiveModel = current.clone().into();
                active.street = Set(pick(&address.street, &current.street));
                active.number = Set(pick(&address.number, &current.number));
                active.neighborhood = Set(pick(&address.neighborhood, &current.neighborhood));
                active.city = Set(pick(&address.city, &current.city));
                active.state = Set(pick(&address.state, &current.state));
                active.zip_code = Set(pick(&address.zip_code, &current.zip_code));
                if let Some(complement) = address.complement.clone().filter(|c| !c.trim().is_empty()) {
                    active.complement = Set(Some(complement));
                }
                Some(active)
            }
            _ => None,
        };

        let mut active: user::ActiveModel = existing.into();
        if let Some(name) = changes.name.map(|n| n.trim().to_string()) {
            active.name = Set(name);
        }
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(hash) = password_hash {
            active.password_hash = Set(hash);
        }
        if let Some(bytes) = avatar {
            active.avatar = Set(Some(bytes));
        }

        let updated = self
            .db
            .transaction("update_user", move |txn| {
                Box::pin(async move {
                    let user = active.update(txn).await.map_err(map_unique_email)?;
                    if let Some(branch) = branch_update {
                        branch.update(txn).await.map_err(ServiceError::db_error)?;
                    }
                    if let Some(driver) = driver_update {
                        driver.update(txn).await.map_err(ServiceError::db_error)?;
                    }
                    Ok(user)
                })
            })
            .await?;

        info!(user_id = %updated.id, "user updated");
        self.details(updated).await
    }

    /// Enables or disables an account
    #[instrument(skip(self))]
    pub async fn set_status(&self, user_id: Uuid, status: bool) -> Result<user::Model, ServiceError> {
        let existing = self.find_user(user_id).await?;
        let mut active: user::ActiveModel = existing.into();
        active.status = Set(status);
        let updated = active
            .update(self.db.pool())
            .await
            .map_err(ServiceError::db_error)?;

        info!(%user_id, status, "user status changed");
        self.event_sender
            .send_or_log(Event::UserStatusChanged {
                user_id,
                active: status,
            })
            .await;
        Ok(updated)
    }

    /// Checks credentials for login. Unknown email, wrong password and
    /// disabled accounts are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<user::Model, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid credentials".to_string());

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db.pool())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(invalid());
        }
        if !user.status {
            warn!(user_id = %user.id, "login to disabled account");
            return Err(invalid());
        }
        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(self.db.pool())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NoContent(format!("User {} not found", user_id)))
    }

    async fn details(&self, user: user::Model) -> Result<UserDetails, ServiceError> {
        let conn = self.db.pool();
        let full_address = match user.profile {
            UserProfile::Driver => find_driver_for_user(conn, user.id)
                .await?
                .map(|d| d.full_address()),
            UserProfile::Branch => find_branch_for_user(conn, user.id)
                .await?
                .map(|b| b.full_address()),
            UserProfile::Admin => None,
        };

        Ok(UserDetails {
            id: user.id,
            avatar: encode_avatar(user.avatar.as_deref()),
            name: user.name,
            email: user.email,
            status: user.status,
            full_address,
            profile: user.profile,
        })
    }
}

fn ensure_admin_or_self(caller: &AuthUser, user_id: Uuid) -> Result<(), ServiceError> {
    if caller.is_admin_or_self(user_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Only administrators can access other accounts".to_string(),
        ))
    }
}

fn map_unique_email(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict("Email already registered".to_string())
        }
        _ => ServiceError::db_error(err),
    }
}
