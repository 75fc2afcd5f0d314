use crate::model::*;

/// The setting that governs a lounge: the most recently created one, ties
/// broken by the higher id.
pub fn active_setting(settings: &[Setting]) -> Option<&Setting> {
    settings.iter().max_by_key(|s| (s.created_at, s.id))
}

/// Guest-count bounds for a lounge. No setting means no bounds beyond the
/// table's own capacity.
pub fn resolve_bounds(state: &LoungeState) -> GuestBounds {
    match active_setting(&state.settings) {
        Some(s) => GuestBounds {
            min_guest: Some(s.min_guest),
            max_guest: s.max_guest,
        },
        None => GuestBounds::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> LoungeState {
        LoungeState::new(Lounge {
            id: 1,
            name: "Familia Lounge".into(),
            address1: String::new(),
            address2: String::new(),
            postcode: String::new(),
            created_at: 0,
            modified_at: 0,
        })
    }

    fn setting(id: Id, min_guest: u32, created_at: Ms) -> Setting {
        Setting {
            id,
            lounge_id: 1,
            min_guest,
            max_guest: None,
            booking_window_days: None,
            created_at,
        }
    }

    #[test]
    fn no_setting_is_permissive() {
        assert_eq!(resolve_bounds(&state()), GuestBounds::default());
    }

    #[test]
    fn single_setting() {
        let mut ls = state();
        ls.settings.push(Setting { max_guest: Some(10), ..setting(2, 3, 100) });
        assert_eq!(
            resolve_bounds(&ls),
            GuestBounds { min_guest: Some(3), max_guest: Some(10) }
        );
    }

    #[test]
    fn newest_setting_wins() {
        let mut ls = state();
        ls.settings.push(setting(5, 4, 200));
        ls.settings.push(setting(2, 2, 100));
        assert_eq!(resolve_bounds(&ls).min_guest, Some(4));
    }

    #[test]
    fn same_timestamp_falls_back_to_id() {
        let mut ls = state();
        ls.settings.push(setting(7, 6, 100));
        ls.settings.push(setting(3, 2, 100));
        assert_eq!(active_setting(&ls.settings).map(|s| s.id), Some(7));
    }
}
