//! JavaScript phase sources shipped with the client
//!
//! These complement the server's own `Riak.*` built-ins and are sent as
//! inline source; the client never runs them.

/// Passes each object through unchanged
pub const MAP_NOOP: &str = "function (v) { return [v]; }";

/// Sorts descending by the attribute named in `arg`
pub const REDUCE_SORT_BY_ATTRIBUTE: &str = "function (v, arg) { \
return v.sort(function (a, b) { \
if (a[arg] > b[arg]) return -1; \
if (a[arg] < b[arg]) return 1; \
return 0; }); }";

/// Emits the object's key
pub const MAP_KEY: &str = "function (v) { return [v.key]; }";

/// Emits `{key, data}`, decoding JSON-typed values
pub const MAP_KEY_DATA: &str = "function (v) { \
var c = v.values[0], d = c.data; \
if ((c.metadata['content-type'] || '').indexOf('json') !== -1) { d = JSON.parse(d); } \
return [{ key: v.key, data: d }]; }";

/// Keeps `[bucket, key]` only when every constraint in `arg` holds.
/// Each constraint is `{index, eq}` or `{index, range: [start, end]}`.
pub const FILTER_INDEXES: &str = "function (v, keyData, arg) { \
var index = v.values[0].metadata.index || {}; \
for (var i = 0; i < arg.length; i++) { \
var c = arg[i], have = index[c.index]; \
if (have === undefined) { return []; } \
var values = [].concat(have), ok = false; \
for (var j = 0; j < values.length && !ok; j++) { \
var x = values[j]; \
ok = c.range ? (x >= c.range[0] && x <= c.range[1]) : x == c.eq; } \
if (!ok) { return []; } } \
return [[v.bucket, v.key]]; }";

/// Look up a client built-in by name
pub fn by_name(name: &str) -> Option<&'static str> {
    match name {
        "mapNoop" => Some(MAP_NOOP),
        "reduceSortByAttribute" => Some(REDUCE_SORT_BY_ATTRIBUTE),
        _ => None,
    }
}
