use std::sync::Arc;

use tallybook::{
    EntityId, EntityPatch, EntityRow, EntityRows, Family, IdentityEngine, InMemoryRowStore,
    Observation, RequestContext, StoreError, TallyError, TenantId, UserId,
};

fn setup() -> (IdentityEngine, Arc<InMemoryRowStore>, RequestContext) {
    let store = Arc::new(InMemoryRowStore::new());
    let engine = IdentityEngine::new(store.clone(), store.clone());
    let ctx = RequestContext::new(UserId::new(), TenantId::new());
    (engine, store, ctx)
}

#[test]
fn extracted_name_resolves_to_existing_supplier_not_a_third_entity() {
    let (engine, store, ctx) = setup();
    let s1 = store
        .insert(EntityRow::new(ctx.tenant_id, Family::Supplier, "Walmart"))
        .unwrap()
        .id;
    let mut customer = EntityRow::new(ctx.tenant_id, Family::Customer, "Walmart Inc.");
    customer.is_supplier = false;
    store.insert(customer).unwrap();

    let found = engine
        .find_or_create(&ctx, Family::Supplier, "walmart", &Observation::none())
        .unwrap();
    assert_eq!(found.id, s1);
    assert_eq!(engine.list_roots(&ctx, Family::Supplier).unwrap().len(), 1);
}

#[test]
fn placeholder_and_empty_names_are_rejected() {
    let (engine, _store, ctx) = setup();
    for bad in ["", "   ", "processing…", "识别中…", "待识别"] {
        let err = engine
            .find_or_create(&ctx, Family::Customer, bad, &Observation::none())
            .unwrap_err();
        assert!(
            matches!(err, TallyError::InvalidName { .. }),
            "{bad:?} must be rejected"
        );
    }
    assert!(engine.list_roots(&ctx, Family::Customer).unwrap().is_empty());
}

#[test]
fn card_suffix_joins_spellings_and_widens_the_name() {
    let (engine, store, ctx) = setup();
    let visa = store
        .insert(EntityRow::new(ctx.tenant_id, Family::Account, "Visa ****1234"))
        .unwrap()
        .id;

    let found = engine
        .find_or_create(
            &ctx,
            Family::Account,
            "Visa ending in 1234",
            &Observation::none(),
        )
        .unwrap();
    assert_eq!(found.id, visa);
    // Secondary-key hit with a strictly longer raw name widens it.
    assert_eq!(found.name, "Visa ending in 1234");
}

#[test]
fn exact_name_hit_never_rewrites_the_name() {
    let (engine, store, ctx) = setup();
    store
        .insert(EntityRow::new(ctx.tenant_id, Family::Supplier, "Acme"))
        .unwrap();

    let found = engine
        .find_or_create(&ctx, Family::Supplier, "  ACME  ", &Observation::none())
        .unwrap();
    assert_eq!(found.name, "Acme");
}

#[test]
fn tax_number_matches_a_merged_away_row_and_lands_on_canonical() {
    let (engine, store, ctx) = setup();
    // The merged-away row bears the tax number; the root does not.
    let mut old = EntityRow::new(ctx.tenant_id, Family::Supplier, "Acme Hangzhou");
    old.tax_no = Some("91330100MA27".to_string());
    let old = store.insert(old).unwrap().id;
    let root = store
        .insert(EntityRow::new(ctx.tenant_id, Family::Supplier, "Acme Group"))
        .unwrap()
        .id;
    assert!(engine.merge(&ctx, Family::Supplier, &[old], root).unwrap().is_complete());

    let found = engine
        .find_or_create(
            &ctx,
            Family::Supplier,
            "Acme HZ Branch",
            &Observation::with_tax_no("91330100MA27"),
        )
        .unwrap();
    assert_eq!(found.id, root);
}

#[test]
fn merge_history_mapping_beats_a_live_root_with_the_same_name() {
    let (engine, store, ctx) = setup();
    let old = store
        .insert(EntityRow::new(ctx.tenant_id, Family::Supplier, "walmart"))
        .unwrap()
        .id;
    let root = store
        .insert(EntityRow::new(ctx.tenant_id, Family::Supplier, "Walmart Inc"))
        .unwrap()
        .id;
    assert!(engine.merge(&ctx, Family::Supplier, &[old], root).unwrap().is_complete());

    // A fresh root reuses the merged-away name.
    let newcomer = store
        .insert(EntityRow::new(ctx.tenant_id, Family::Supplier, "walmart"))
        .unwrap()
        .id;

    // The prior mapping wins: the same raw text keeps landing on `root`.
    let found = engine
        .find_or_create(&ctx, Family::Supplier, "Walmart", &Observation::none())
        .unwrap();
    assert_eq!(found.id, root);
    assert_ne!(found.id, newcomer);
}

#[test]
fn heuristic_key_matches_storefront_variants_for_suppliers() {
    let (engine, store, ctx) = setup();
    let s = store
        .insert(EntityRow::new(ctx.tenant_id, Family::Supplier, "全家便利店"))
        .unwrap()
        .id;

    let found = engine
        .find_or_create(&ctx, Family::Supplier, "全家", &Observation::none())
        .unwrap();
    assert_eq!(found.id, s);
}

#[test]
fn heuristic_is_not_used_for_accounts() {
    let (engine, store, ctx) = setup();
    store
        .insert(EntityRow::new(ctx.tenant_id, Family::Account, "现金 store"))
        .unwrap();

    let found = engine
        .find_or_create(&ctx, Family::Account, "现金", &Observation::none())
        .unwrap();
    // No heuristic for accounts: a new account is created.
    assert_eq!(found.name, "现金");
    assert_eq!(engine.list_roots(&ctx, Family::Account).unwrap().len(), 2);
}

#[test]
fn match_backfills_missing_attributes_only() {
    let (engine, store, ctx) = setup();
    let mut existing = EntityRow::new(ctx.tenant_id, Family::Supplier, "Acme");
    existing.phone = Some("555-0100".to_string());
    let id = store.insert(existing).unwrap().id;

    let found = engine
        .find_or_create(
            &ctx,
            Family::Supplier,
            "Acme",
            &Observation {
                tax_no: Some("91330100MA27".to_string()),
                phone: Some("555-9999".to_string()),
                address: Some("1 Main St".to_string()),
                ..Observation::default()
            },
        )
        .unwrap();

    assert_eq!(found.id, id);
    assert_eq!(found.tax_no.as_deref(), Some("91330100MA27"));
    assert_eq!(found.address.as_deref(), Some("1 Main St"));
    // The present phone is kept.
    assert_eq!(found.phone.as_deref(), Some("555-0100"));
}

#[test]
fn created_rows_are_flagged_ai_recognized() {
    let (engine, _store, ctx) = setup();
    let created = engine
        .find_or_create(&ctx, Family::Sku, "Blue widget", &Observation::with_code("BW-1"))
        .unwrap();
    assert!(created.ai_recognized);
    assert_eq!(created.code.as_deref(), Some("BW-1"));

    // Second call with the same code but a different name: secondary hit.
    let again = engine
        .find_or_create(&ctx, Family::Sku, "Widget, blue", &Observation::with_code("BW-1"))
        .unwrap();
    assert_eq!(again.id, created.id);
}

/// Delegating store whose `list` hides one name, simulating a reader whose
/// snapshot predates a rival's commit. The insert then collides and the
/// re-query path must find the rival.
struct StaleListStore {
    inner: Arc<InMemoryRowStore>,
    hide: String,
}

impl EntityRows for StaleListStore {
    fn list(&self, tenant: TenantId, family: Family) -> Result<Vec<EntityRow>, StoreError> {
        let mut rows = self.inner.list(tenant, family)?;
        rows.retain(|row| row.name != self.hide);
        Ok(rows)
    }

    fn list_by_warehouse(&self, warehouse_id: EntityId) -> Result<Vec<EntityRow>, StoreError> {
        self.inner.list_by_warehouse(warehouse_id)
    }

    fn get(
        &self,
        tenant: TenantId,
        family: Family,
        id: EntityId,
    ) -> Result<Option<EntityRow>, StoreError> {
        self.inner.get(tenant, family, id)
    }

    fn get_many(
        &self,
        tenant: TenantId,
        family: Family,
        ids: &[EntityId],
    ) -> Result<Vec<EntityRow>, StoreError> {
        self.inner.get_many(tenant, family, ids)
    }

    fn find_by_name(
        &self,
        tenant: TenantId,
        family: Family,
        name: &str,
    ) -> Result<Vec<EntityRow>, StoreError> {
        self.inner.find_by_name(tenant, family, name)
    }

    fn insert(&self, row: EntityRow) -> Result<EntityRow, StoreError> {
        self.inner.insert(row)
    }

    fn update(
        &self,
        tenant: TenantId,
        family: Family,
        id: EntityId,
        patch: EntityPatch,
    ) -> Result<EntityRow, StoreError> {
        self.inner.update(tenant, family, id, patch)
    }

    fn delete(&self, tenant: TenantId, family: Family, id: EntityId) -> Result<(), StoreError> {
        self.inner.delete(tenant, family, id)
    }
}

#[test]
fn concurrent_creation_race_converges_on_one_row() {
    let inner = Arc::new(InMemoryRowStore::new());
    let ctx = RequestContext::new(UserId::new(), TenantId::new());

    // First caller creates normally.
    let first_engine = IdentityEngine::new(inner.clone(), inner.clone());
    let winner = first_engine
        .find_or_create(&ctx, Family::Customer, "Fresh Mart", &Observation::none())
        .unwrap();

    // Second caller reads a snapshot from before the winner's commit,
    // concludes "no match, create", and loses the insert to the unique
    // constraint.
    let stale = Arc::new(StaleListStore {
        inner: inner.clone(),
        hide: "Fresh Mart".to_string(),
    });
    let second_engine = IdentityEngine::new(stale, inner.clone());
    let loser = second_engine
        .find_or_create(&ctx, Family::Customer, "Fresh Mart", &Observation::none())
        .unwrap();

    // Both callers observe the same id; exactly one row exists.
    assert_eq!(winner.id, loser.id);
    assert_eq!(
        first_engine.list_roots(&ctx, Family::Customer).unwrap().len(),
        1
    );
}
