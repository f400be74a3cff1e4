use std::fs;

use anyhow::Result;

use warden_core::{
    config::parse_desired,
    pair_entries,
    peer::ManagedPeerGroup,
    permission::{LiveGroupRef, Permission, PortRange},
    state::{LocalCollection, StateFile},
    Reconciler, ReconciliationContext,
};

const DESIRED: &str = r#"
- protocol: tcp
  port_range:
    from: 22
    to: 22
  ip_ranges:
    - "10.0.0.0/8"
- protocol: tcp
  port_range:
    from: 443
    to: 443
  ip_ranges:
    - "0.0.0.0/0"
  peers:
    - web
    - amazon-elb-sg
    - ["ownerB", "sg-2"]
"#;

fn initial_state() -> StateFile {
    StateFile {
        groups: vec![
            LiveGroupRef::new("ownerA", "sg-1", "web"),
            LiveGroupRef::new("ownerB", "sg-2", "api"),
            LiveGroupRef::new("ownerA", "sg-3", "legacy"),
            LiveGroupRef::new("amazon-elb", "sg-843f59ed", "amazon-elb-sg").managed(),
        ],
        permissions: vec![
            Permission {
                protocol: "tcp".to_owned(),
                port_range: PortRange::single(22),
                description: None,
                ip_ranges: Some(vec!["10.0.0.0/8".to_owned(), "192.168.1.0/24".to_owned()]),
                groups: None,
            },
            Permission {
                protocol: "tcp".to_owned(),
                port_range: PortRange::single(3306),
                description: Some("old database rule".to_owned()),
                ip_ranges: None,
                groups: Some(vec![LiveGroupRef::new("ownerA", "sg-3", "legacy")]),
            },
        ],
    }
}

fn context() -> ReconciliationContext {
    ReconciliationContext::new("ownerA")
        .with_managed(ManagedPeerGroup::new("amazon-elb", "amazon-elb-sg"))
}

#[tokio::test]
async fn local_collection_converges() -> Result<()> {
    let ctx = context();
    let desired = parse_desired(DESIRED)?;
    let coll = LocalCollection::in_memory("sg-test", initial_state());

    let entries = pair_entries(&desired, &coll.permissions().await)?;
    let reconciler = Reconciler::new(&coll, &ctx);
    assert!(!reconciler.all_match(&entries)?);
    reconciler.reconcile_all(&entries, 2).await?;

    // A fresh look at the live state matches the declaration
    let entries = pair_entries(&desired, &coll.permissions().await)?;
    assert!(reconciler.all_match(&entries)?);
    assert!(reconciler.plan_all(&entries)?.is_empty());

    let perms = coll.permissions().await;
    assert_eq!(perms.len(), 2);
    assert!(perms
        .iter()
        .all(|p| p.port_range != PortRange::single(3306)));
    Ok(())
}

#[tokio::test]
async fn state_is_written_back_to_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("state.yaml");
    fs::write(&path, initial_state().to_yaml()?)?;

    let ctx = context();
    let desired = parse_desired(DESIRED)?;
    let coll = LocalCollection::open("sg-test", &path)?;
    let entries = pair_entries(&desired, &coll.permissions().await)?;
    Reconciler::new(&coll, &ctx)
        .reconcile_all(&entries, 1)
        .await?;

    let reread = StateFile::read_from_file(&path)?;
    assert_eq!(reread, coll.snapshot().await);
    Ok(())
}

#[tokio::test]
async fn dry_run_leaves_state_alone() -> Result<()> {
    let ctx = context();
    let desired = parse_desired(DESIRED)?;
    let coll = LocalCollection::in_memory("sg-test", initial_state());
    let entries = pair_entries(&desired, &coll.permissions().await)?;

    Reconciler::new(&coll, &ctx)
        .with_options(warden_core::reconcile::ReconcileOptions { dry_run: true })
        .reconcile_all(&entries, 4)
        .await?;

    assert_eq!(coll.snapshot().await, initial_state());
    Ok(())
}
