//! Lua scripts for atomic redis queue operations.
//!
//! Several service instances share one queue. These scripts run atomically
//! inside redis so two concurrent arrivals on different instances cannot
//! both observe an empty queue, and two concurrent polls cannot both
//! collect the same outcome.
//!
//! Queue entries are the JSON-serialized `WaitingParty` values; staleness
//! is decided inside the script by comparing the entry's `enqueued_at_ms`
//! against the cutoff passed in ARGV, so the freshness check and the pop
//! are a single atomic step.

/// Lua script for the arrival operation: pop the earliest fresh waiter or
/// enqueue the arrival.
///
/// Arguments:
/// - KEYS[1]: Queue key (`matchmaking:queue`)
/// - ARGV[1]: Staleness cutoff (epoch milliseconds; entries enqueued
///   before this are stale)
/// - ARGV[2]: Arrival entry (JSON string), enqueued only when no fresh
///   waiter exists
///
/// Returns a flat array of strings:
/// - `["matched", popped_entry, stale_entry...]` when a fresh waiter was
///   popped
/// - `["enqueued", stale_entry...]` when the arrival was appended
///
/// Stale entries skipped along the way are removed from the queue and
/// returned so the caller can record their expiry.
pub const POP_OR_ENQUEUE: &str = r#"
local expired = {}

while true do
    local head = redis.call('LPOP', KEYS[1])
    if head == nil or head == false then
        break
    end

    local waiter = cjson.decode(head)
    if tonumber(waiter['enqueued_at_ms']) >= tonumber(ARGV[1]) then
        -- Fresh waiter at the head: this is the match
        local reply = {'matched', head}
        for i = 1, #expired do
            reply[i + 2] = expired[i]
        end
        return reply
    end

    -- Stale waiter, set aside and keep looking
    expired[#expired + 1] = head
end

-- Queue had no fresh waiter, the arrival becomes one
redis.call('RPUSH', KEYS[1], ARGV[2])

local reply = {'enqueued'}
for i = 1, #expired do
    reply[i + 1] = expired[i]
end
return reply
"#;

/// Lua script for atomic read-and-delete of an outcome record.
///
/// Arguments:
/// - KEYS[1]: Outcome key (`party:{id}:outcome`)
///
/// Returns the stored JSON string, or nil when the key does not exist.
/// Under concurrent invocations exactly one caller gets the value.
pub const TAKE_OUTCOME: &str = r#"
local value = redis.call('GET', KEYS[1])
if value == nil or value == false then
    return false
end

redis.call('DEL', KEYS[1])
return value
"#;

/// Lua script to remove a waiter from the queue by party id.
///
/// Arguments:
/// - KEYS[1]: Queue key
/// - ARGV[1]: Party id
///
/// Returns the removed entry (JSON string), or nil when no entry with
/// that id was queued.
pub const REMOVE_WAITER: &str = r#"
local entries = redis.call('LRANGE', KEYS[1], 0, -1)

for i = 1, #entries do
    local waiter = cjson.decode(entries[i])
    if waiter['id'] == ARGV[1] then
        redis.call('LREM', KEYS[1], 1, entries[i])
        return entries[i]
    end
end

return false
"#;

/// Lua script to drain every stale waiter from the queue.
///
/// Arguments:
/// - KEYS[1]: Queue key
/// - ARGV[1]: Staleness cutoff (epoch milliseconds)
///
/// Returns the removed entries as an array of JSON strings (possibly
/// empty). Scans the whole list rather than stopping at the first fresh
/// entry, so ordering anomalies from clock skew between instances cannot
/// hide a stale waiter.
pub const DRAIN_STALE: &str = r#"
local entries = redis.call('LRANGE', KEYS[1], 0, -1)
local drained = {}

for i = 1, #entries do
    local waiter = cjson.decode(entries[i])
    if tonumber(waiter['enqueued_at_ms']) < tonumber(ARGV[1]) then
        redis.call('LREM', KEYS[1], 1, entries[i])
        drained[#drained + 1] = entries[i]
    end
end

return drained
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_valid_lua() {
        // Just verify the scripts are non-empty and contain expected keywords
        assert!(POP_OR_ENQUEUE.contains("redis.call"));
        assert!(POP_OR_ENQUEUE.contains("LPOP"));
        assert!(POP_OR_ENQUEUE.contains("RPUSH"));

        assert!(TAKE_OUTCOME.contains("GET"));
        assert!(TAKE_OUTCOME.contains("DEL"));

        assert!(REMOVE_WAITER.contains("LRANGE"));
        assert!(REMOVE_WAITER.contains("LREM"));

        assert!(DRAIN_STALE.contains("LRANGE"));
        assert!(DRAIN_STALE.contains("LREM"));
    }

    #[test]
    fn test_script_length() {
        // Ensure scripts are reasonable size (not accidentally empty or huge)
        assert!(POP_OR_ENQUEUE.len() > 100);
        assert!(POP_OR_ENQUEUE.len() < 2000);

        assert!(TAKE_OUTCOME.len() > 50);
        assert!(TAKE_OUTCOME.len() < 500);

        assert!(REMOVE_WAITER.len() > 100);
        assert!(REMOVE_WAITER.len() < 1000);

        assert!(DRAIN_STALE.len() > 100);
        assert!(DRAIN_STALE.len() < 1000);
    }

    #[test]
    fn test_pop_or_enqueue_status_markers() {
        // The Rust side dispatches on the first reply element; both markers
        // must be present in the script
        assert!(POP_OR_ENQUEUE.contains("'matched'"));
        assert!(POP_OR_ENQUEUE.contains("'enqueued'"));
    }

    #[test]
    fn test_pop_or_enqueue_freshness_comparison() {
        // Fresh means enqueued at-or-after the cutoff; the mirror of the
        // strictly-before staleness check used everywhere else
        assert!(POP_OR_ENQUEUE.contains(">= tonumber(ARGV[1])"));
    }

    #[test]
    fn test_pop_or_enqueue_handles_nil_head() {
        // Redis nil surfaces as false in Lua; both spellings must be handled
        assert!(POP_OR_ENQUEUE.contains("if head == nil or head == false then"));
    }

    #[test]
    fn test_take_outcome_deletes_after_read() {
        // GET must precede DEL so the value is returned exactly once
        let get_pos = TAKE_OUTCOME.find("GET").unwrap_or(usize::MAX);
        let del_pos = TAKE_OUTCOME.find("DEL").unwrap_or(0);
        assert!(get_pos < del_pos);
    }

    #[test]
    fn test_remove_waiter_matches_by_id() {
        assert!(REMOVE_WAITER.contains("waiter['id'] == ARGV[1]"));
        // LREM count 1: entries are unique by UUID, remove exactly one
        assert!(REMOVE_WAITER.contains("LREM', KEYS[1], 1"));
    }

    #[test]
    fn test_drain_stale_uses_strict_cutoff() {
        // Stale means strictly before the cutoff
        assert!(DRAIN_STALE.contains("< tonumber(ARGV[1])"));
    }

    #[test]
    fn test_drain_stale_scans_whole_queue() {
        // Full LRANGE scan, not a stop-at-first-fresh loop
        assert!(DRAIN_STALE.contains("LRANGE', KEYS[1], 0, -1"));
    }
}
