//! Deny-list coverage using the gateway's actual default configuration
//! (spec §4.8, §6), as opposed to the ad hoc pattern sets exercised by the
//! unit tests alongside `DenyList` itself.

use family_storage_gateway::config::ConfigBuilder;
use family_storage_gateway::proxy::deny_list::DenyList;

#[test]
fn default_configuration_blocks_every_documented_dangerous_pattern() {
    let config = ConfigBuilder::new().build().unwrap();
    let deny_list = DenyList::new(config.proxy.deny_patterns);

    for sql in [
        "DROP DATABASE family_storage_gateway",
        "drop schema public cascade",
        "TRUNCATE TABLE file_metadata",
        "DELETE FROM file_metadata WHERE 1=1",
        "ALTER SYSTEM SET shared_buffers = '4GB'",
        "CREATE ROLE attacker SUPERUSER",
        "DROP ROLE attacker",
    ] {
        assert!(deny_list.check(sql).is_some(), "expected block for: {sql}");
    }
}

#[test]
fn ordinary_crud_statements_pass_through() {
    let config = ConfigBuilder::new().build().unwrap();
    let deny_list = DenyList::new(config.proxy.deny_patterns);

    for sql in [
        "SELECT * FROM file_metadata WHERE family_id = $1",
        "INSERT INTO file_metadata (file_id) VALUES ($1)",
        "UPDATE file_metadata SET access_count = access_count + 1 WHERE file_id = $1",
    ] {
        assert!(deny_list.check(sql).is_none(), "expected pass for: {sql}");
    }
}
