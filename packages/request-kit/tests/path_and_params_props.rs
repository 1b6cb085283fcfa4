//! Property tests for path id extraction, parameter merging and base URLs.

use proptest::prelude::*;
use request_kit::web::request_utils::{base_url_from, first_values, id_from_path};

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}"
}

proptest! {
    /// Property: a trailing numeric segment is the id
    #[test]
    fn prop_trailing_number_is_id(
        segments in prop::collection::vec(segment(), 0..4),
        id in 0i64..=i64::MAX,
    ) {
        let path = format!("/{}/{id}", segments.join("/"));
        prop_assert_eq!(id_from_path(&path), Some(id));
    }

    /// Property: no id unless the path ends in digits
    #[test]
    fn prop_non_numeric_tail_has_no_id(
        segments in prop::collection::vec(segment(), 1..4),
        trailing_slash in any::<bool>(),
    ) {
        let mut path = format!("/{}", segments.join("/"));
        if trailing_slash {
            path.push('/');
        }
        prop_assert_eq!(id_from_path(&path), None);
    }

    /// Property: the path id always wins over an `id` parameter
    #[test]
    fn prop_path_id_overrides_param(
        literal in "[a-z0-9]{1,8}",
        id in any::<i64>(),
    ) {
        let query = format!("id={literal}");
        let params = first_values(&query, Some(format!("id={literal}x").as_bytes()), Some(id));
        prop_assert_eq!(params.get("id").cloned(), Some(id.to_string()));
    }

    /// Property: the first value of a repeated name wins, query before form
    #[test]
    fn prop_first_value_wins(
        name in segment(),
        first in "[a-z0-9]{1,8}",
        later in "[a-z0-9]{1,8}",
    ) {
        let query = format!("{name}={first}&{name}={later}");
        let form = format!("{name}={later}");
        let params = first_values(&query, Some(form.as_bytes()), None);
        prop_assert_eq!(params.get(&name).cloned(), Some(first));
    }

    /// Property: base URL drops the request path and any query
    #[test]
    fn prop_base_url_strips_uri(
        host in "[a-z]{1,10}\\.(com|org)",
        port in 1u16..=u16::MAX,
        segments in prop::collection::vec(segment(), 1..4),
        query in "[a-z]{1,5}=[0-9]{1,4}",
    ) {
        let uri = format!("/{}", segments.join("/"));
        let full = format!("https://{host}:{port}{uri}?{query}");
        prop_assert_eq!(base_url_from(&full, &uri), format!("https://{host}:{port}"));
    }
}

#[test]
fn test_overflowing_id_is_none() {
    assert_eq!(id_from_path("/clientes/autorizar/99999999999999999999"), None);
}
