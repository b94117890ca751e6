use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use sea_orm::DatabaseTransaction;

use crate::{BulkLoadMode, FlatKeyValue, Host, MembershipSet};
use attrstore_core::{
    AttrError, AttrResult, AttributeMapApi, attribute_key, checked_attribute_key, escape,
    split_attribute_key, validate_owner,
};

pub const PROPERTIES_SUFFIX: &str = "_properties";
pub const OWNERS_SUFFIX: &str = "_set_of_all_ids";
pub const SEEN_PROPERTIES_SUFFIX: &str = "_encountered_property_keys";

/// Outcome of [`AttributeStore::set_large_map`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkLoadReport {
    pub new_properties: usize,
    pub known_owners: usize,
    pub new_owners: usize,
    pub values_written: usize,
}

/// Encoded rows of one owner, ready to be written.
type OwnerRows = (String, Vec<(String, String)>);

/// Two-level owner -> property -> value map over three relations: the value
/// table keyed by `owner¤property`, the owner index and the property index.
///
/// The owner and property indexes are only kept consistent with the value
/// table when every write goes through this type. The property index is
/// monotonic: deleting values never shrinks it, see
/// [`AttributeStore::rebuild_property_index`].
#[derive(Clone)]
pub struct AttributeStore {
    host: Host,
    name: String,
    values: FlatKeyValue,
    owners: MembershipSet,
    properties: MembershipSet,
}

impl AttributeStore {
    /// Opens the attribute store `name`, creating any missing relation.
    pub async fn open(host: &Host, name: &str) -> AttrResult<Self> {
        let values =
            FlatKeyValue::attach(host, escape::table_name(name, PROPERTIES_SUFFIX)?).await?;
        let owners =
            MembershipSet::attach(host, escape::table_name(name, OWNERS_SUFFIX)?).await?;
        let properties =
            MembershipSet::attach(host, escape::table_name(name, SEEN_PROPERTIES_SUFFIX)?)
                .await?;
        Ok(Self {
            host: host.clone(),
            name: name.to_string(),
            values,
            owners,
            properties,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_value(&self) -> &FlatKeyValue {
        &self.values
    }

    pub fn owner_set(&self) -> &MembershipSet {
        &self.owners
    }

    pub fn property_set(&self) -> &MembershipSet {
        &self.properties
    }

    fn tables(&self) -> [&str; 3] {
        [
            self.values.table(),
            self.owners.table(),
            self.properties.table(),
        ]
    }

    /// Writes `properties` for `owner` inside `tx`. Validation failures abort
    /// before anything else is written by this call, but earlier statements
    /// in `tx` remain; the caller decides whether to roll back.
    pub async fn set_map_with(
        &self,
        tx: &DatabaseTransaction,
        owner: &str,
        properties: &HashMap<String, String>,
    ) -> AttrResult<()> {
        validate_owner(owner)?;
        if properties.is_empty() {
            return Ok(());
        }
        self.owners.add_with(tx, owner).await?;
        for (property, value) in properties {
            let key = checked_attribute_key(owner, property)?;
            self.properties.add_with(tx, property).await?;
            self.values.set_with(tx, &key, value).await?;
        }
        Ok(())
    }

    /// Bulk ingest of many owners at once.
    ///
    /// Owner and property names are not checked for the separator, so this
    /// must only be fed trusted input. Owners already in the owner index get
    /// update-or-insert writes; new owners get plain inserts. With
    /// [`BulkLoadMode::Phased`] the property index, known-owner and new-owner
    /// writes commit independently and a concurrent reader can observe any
    /// subset of them.
    pub async fn set_large_map(
        &self,
        entries: &HashMap<String, HashMap<String, String>>,
    ) -> AttrResult<BulkLoadReport> {
        let conn = self.host.connection();
        let seen_properties: HashSet<String> =
            self.properties.all_with(conn).await?.into_iter().collect();
        let seen_owners: HashSet<String> = self.owners.all_with(conn).await?.into_iter().collect();

        let mut new_properties = BTreeSet::new();
        let mut known: Vec<OwnerRows> = Vec::new();
        let mut fresh: Vec<OwnerRows> = Vec::new();
        let mut values_written = 0;
        for (owner, properties) in entries {
            if properties.is_empty() {
                continue;
            }
            let mut rows = Vec::with_capacity(properties.len());
            for (property, value) in properties {
                if !seen_properties.contains(property) {
                    new_properties.insert(property.clone());
                }
                rows.push((attribute_key(owner, property), self.host.encode_value(value)?));
            }
            values_written += rows.len();
            if seen_owners.contains(owner) {
                known.push((owner.clone(), rows));
            } else {
                fresh.push((owner.clone(), rows));
            }
        }
        let new_properties: Vec<String> = new_properties.into_iter().collect();
        let report = BulkLoadReport {
            new_properties: new_properties.len(),
            known_owners: known.len(),
            new_owners: fresh.len(),
            values_written,
        };

        match self.host.bulk_load_mode() {
            BulkLoadMode::Phased => {
                let (properties, updated, inserted) = tokio::join!(
                    self.run_phase(self.write_properties_phase(&new_properties)),
                    self.run_phase(self.write_known_owners_phase(&known)),
                    self.run_phase(self.write_new_owners_phase(&fresh)),
                );
                properties?;
                updated?;
                inserted?;
            }
            BulkLoadMode::Atomic => {
                let tx = self.host.begin().await?;
                self.write_properties(&tx, &new_properties).await?;
                self.write_known_owners(&tx, &known).await?;
                self.write_new_owners(&tx, &fresh).await?;
                self.host.commit(tx).await?;
            }
        }
        log::info!(
            "attrstore {}: bulk loaded {} values ({} new owners, {} known owners, {} new properties)",
            self.name,
            report.values_written,
            report.new_owners,
            report.known_owners,
            report.new_properties
        );
        Ok(report)
    }

    async fn run_phase(&self, phase: impl Future<Output = AttrResult<()>>) -> AttrResult<()> {
        phase.await.inspect_err(|err| {
            log::warn!("attrstore {}: bulk load phase failed: {err}", self.name);
        })
    }

    async fn write_properties_phase(&self, properties: &[String]) -> AttrResult<()> {
        if properties.is_empty() {
            return Ok(());
        }
        let tx = self.host.begin().await?;
        self.write_properties(&tx, properties).await?;
        self.host.commit(tx).await
    }

    async fn write_known_owners_phase(&self, owners: &[OwnerRows]) -> AttrResult<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let tx = self.host.begin().await?;
        self.write_known_owners(&tx, owners).await?;
        self.host.commit(tx).await
    }

    async fn write_new_owners_phase(&self, owners: &[OwnerRows]) -> AttrResult<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let tx = self.host.begin().await?;
        self.write_new_owners(&tx, owners).await?;
        self.host.commit(tx).await
    }

    async fn write_properties(
        &self,
        tx: &DatabaseTransaction,
        properties: &[String],
    ) -> AttrResult<()> {
        for property in properties {
            self.properties.add_no_check_with(tx, property).await?;
        }
        Ok(())
    }

    async fn write_known_owners(
        &self,
        tx: &DatabaseTransaction,
        owners: &[OwnerRows],
    ) -> AttrResult<()> {
        for (_, rows) in owners {
            for (key, encoded) in rows {
                self.values.put_encoded_with(tx, key, encoded).await?;
            }
        }
        Ok(())
    }

    async fn write_new_owners(
        &self,
        tx: &DatabaseTransaction,
        owners: &[OwnerRows],
    ) -> AttrResult<()> {
        for (owner, rows) in owners {
            self.owners.add_no_check_with(tx, owner).await?;
            for (key, encoded) in rows {
                if self.values.insert_with(tx, key, encoded).await? != 1 {
                    return Err(AttrError::storage(format!(
                        "could not insert key {key} in {}",
                        self.values.table()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every property stored for `owner`, empty values included, read in one
    /// transaction. An unknown owner yields an empty map.
    pub async fn owner_map(&self, owner: &str) -> AttrResult<HashMap<String, String>> {
        let tx = self.host.begin().await?;
        let mut values = HashMap::new();
        for property in self.properties.all_with(&tx).await? {
            match self
                .values
                .get_with(&tx, &attribute_key(owner, &property))
                .await
            {
                Ok(value) => {
                    values.insert(property, value);
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        self.host.commit(tx).await?;
        Ok(values)
    }

    /// [`AttributeStore::owner_map`] as a JSON object with sorted keys.
    pub async fn owner_json(&self, owner: &str) -> AttrResult<String> {
        let values: BTreeMap<String, String> = self.owner_map(owner).await?.into_iter().collect();
        serde_json::to_string(&values)
            .map_err(|err| AttrError::storage(format!("encode {owner} as json: {err}")))
    }

    pub async fn is_empty(&self) -> AttrResult<bool> {
        Ok(self.count().await? == 0)
    }

    /// Rebuilds the property index from the names actually present in the
    /// value table and returns how many remain.
    pub async fn rebuild_property_index(&self) -> AttrResult<usize> {
        let tx = self.host.begin().await?;
        let live: BTreeSet<String> = self
            .values
            .all_with(&tx)
            .await?
            .iter()
            .filter_map(|key| split_attribute_key(key).map(|(_, property)| property.to_string()))
            .collect();
        self.properties.clear_with(&tx).await?;
        for property in &live {
            self.properties.add_no_check_with(&tx, property).await?;
        }
        self.host.commit(tx).await?;
        log::info!(
            "attrstore {}: property index rebuilt with {} names",
            self.name,
            live.len()
        );
        Ok(live.len())
    }

    /// Drops all three relations in one transaction.
    pub async fn remove(self) -> AttrResult<()> {
        if !self.host.transactional_ddl() {
            log::warn!(
                "attrstore {}: backend commits DDL implicitly, removal is not atomic",
                self.name
            );
        }
        let tx = self.host.begin().await?;
        self.host.drop_tables(&tx, &self.tables()).await?;
        self.host.commit(tx).await?;
        log::info!("attrstore {}: removed", self.name);
        Ok(())
    }
}

#[async_trait]
impl AttributeMapApi for AttributeStore {
    async fn get(&self, owner: &str, property: &str) -> AttrResult<String> {
        self.values
            .get_with(self.host.connection(), &attribute_key(owner, property))
            .await
    }

    async fn has(&self, owner: &str, property: &str) -> AttrResult<bool> {
        match AttributeMapApi::get(self, owner, property).await {
            Ok(value) => Ok(!value.is_empty()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn exists(&self, owner: &str) -> AttrResult<bool> {
        self.owners.has_with(self.host.connection(), owner).await
    }

    async fn set(&self, owner: &str, property: &str, value: &str) -> AttrResult<()> {
        let properties = HashMap::from([(property.to_string(), value.to_string())]);
        self.set_map(owner, &properties).await
    }

    async fn set_map(
        &self,
        owner: &str,
        properties: &HashMap<String, String>,
    ) -> AttrResult<()> {
        let tx = self.host.begin().await?;
        self.set_map_with(&tx, owner, properties).await?;
        self.host.commit(tx).await
    }

    async fn get_map(
        &self,
        owner: &str,
        properties: &[String],
    ) -> AttrResult<HashMap<String, String>> {
        let tx = self.host.begin().await?;
        let mut results = HashMap::with_capacity(properties.len());
        for property in properties {
            let value = self
                .values
                .get_with(&tx, &attribute_key(owner, property))
                .await?;
            results.insert(property.clone(), value);
        }
        self.host.commit(tx).await?;
        Ok(results)
    }

    async fn keys(&self, owner: &str) -> AttrResult<Vec<String>> {
        let mut keys = Vec::new();
        for property in self.properties.all_with(self.host.connection()).await? {
            if AttributeMapApi::has(self, owner, &property).await? {
                keys.push(property);
            }
        }
        Ok(keys)
    }

    async fn owners(&self) -> AttrResult<Vec<String>> {
        self.owners.all_with(self.host.connection()).await
    }

    async fn count(&self) -> AttrResult<u64> {
        self.owners.count_with(self.host.connection()).await
    }

    async fn all_where(&self, property: &str, value: &str) -> AttrResult<Vec<String>> {
        let mut matches = Vec::new();
        for owner in self.owners.all_with(self.host.connection()).await? {
            match AttributeMapApi::get(self, &owner, property).await {
                Ok(found) if found == value => matches.push(owner),
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(matches)
    }

    async fn all_encountered_keys(&self) -> AttrResult<Vec<String>> {
        self.properties.all_with(self.host.connection()).await
    }

    async fn del_key(&self, owner: &str, property: &str) -> AttrResult<()> {
        self.values
            .del_with(self.host.connection(), &attribute_key(owner, property))
            .await
    }

    async fn del(&self, owner: &str) -> AttrResult<()> {
        let tx = self.host.begin().await?;
        for property in self.properties.all_with(&tx).await? {
            self.values
                .del_with(&tx, &attribute_key(owner, &property))
                .await?;
        }
        self.owners.del_with(&tx, owner).await?;
        self.host.commit(tx).await
    }

    async fn clear(&self) -> AttrResult<()> {
        let tx = self.host.begin().await?;
        self.host.truncate_tables(&tx, &self.tables()).await?;
        self.host.commit(tx).await
    }
}
