use super::*;

fn hero(id: &str) -> Asset {
    Asset::new(id, id.to_uppercase(), format!("char/{id}.png"))
}

#[test]
fn lane_mapping_for_six_and_three_positions() {
    let six: Vec<_> = (0..6).map(Lane::of_position::<6>).collect();
    assert_eq!(
        six,
        vec![
            Lane::Back,
            Lane::Back,
            Lane::Mid,
            Lane::Mid,
            Lane::Front,
            Lane::Front
        ]
    );
    let three: Vec<_> = (0..3).map(Lane::of_position::<3>).collect();
    assert_eq!(three, vec![Lane::Back, Lane::Mid, Lane::Front]);
}

#[test]
fn relocate_then_toggle_off() {
    let mut f = CharacterFormation::characters();

    assert_eq!(f.assign(0, Some(hero("a"))).unwrap(), Transition::Placed);
    assert_eq!(f.lane_occupancy(Lane::Back), 1);
    assert_eq!(f.occupied(), 1);

    assert_eq!(
        f.assign(1, Some(hero("a"))).unwrap(),
        Transition::Moved {
            from: 0,
            previous: None
        }
    );
    assert!(f.get(0).is_none());
    assert_eq!(f.get(1).unwrap().id, "a");
    assert_eq!(f.lane_occupancy(Lane::Back), 1);
    assert_eq!(f.occupied(), 1);

    assert_eq!(f.assign(1, Some(hero("a"))).unwrap(), Transition::ToggledOff);
    assert_eq!(f.occupied(), 0);
    assert_eq!(f.state(1).unwrap(), PositionState::Empty);
}

#[test]
fn full_back_lane_still_accepts_mid_lane() {
    let mut f = CharacterFormation::characters();
    f.assign(0, Some(hero("a"))).unwrap();
    f.assign(1, Some(hero("b"))).unwrap();
    assert_eq!(f.lane_occupancy(Lane::Back), 2);

    assert_eq!(f.assign(2, Some(hero("c"))).unwrap(), Transition::Placed);
    assert_eq!(f.occupied(), 3);
}

#[test]
fn third_character_into_full_lane_keeps_lane_at_two() {
    let mut f = CharacterFormation::characters();
    f.assign(2, Some(hero("a"))).unwrap();
    f.assign(3, Some(hero("b"))).unwrap();
    assert_eq!(f.lane_occupancy(Lane::Mid), 2);

    // Both mid seats are taken, so a third character can only replace an occupant.
    f.assign(2, Some(hero("c"))).unwrap();
    assert_eq!(f.lane_occupancy(Lane::Mid), 2);
    assert_eq!(f.occupied(), 2);
}

#[test]
fn lane_cap_rejects_fill_below_total_cap() {
    let mut f = Formation::<6>::new(FormationPolicy {
        max_total: Some(5),
        max_per_lane: Some(1),
    });
    f.assign(2, Some(hero("a"))).unwrap();
    let before = f.clone();

    assert_eq!(
        f.assign(3, Some(hero("b"))).unwrap(),
        Transition::Rejected(PolicyViolation::LaneFull(Lane::Mid))
    );
    assert_eq!(f, before);
}

#[test]
fn sixth_character_into_full_formation_is_rejected() {
    let mut f = CharacterFormation::characters();
    for (pos, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        assert_eq!(f.assign(pos, Some(hero(id))).unwrap(), Transition::Placed);
    }
    assert_eq!(f.occupied(), 5);
    let before = f.clone();

    assert_eq!(
        f.assign(5, Some(hero("f"))).unwrap(),
        Transition::Rejected(PolicyViolation::FormationFull)
    );
    assert_eq!(f, before);
}

#[test]
fn moving_within_full_formation_is_allowed() {
    let mut f = CharacterFormation::characters();
    for (pos, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        f.assign(pos, Some(hero(id))).unwrap();
    }
    // `a` leaves the back lane for the last free seat; the vacated seat frees total capacity.
    assert_eq!(
        f.assign(5, Some(hero("a"))).unwrap(),
        Transition::Moved {
            from: 0,
            previous: None
        }
    );
    assert_eq!(f.occupied(), 5);
    assert_eq!(f.lane_occupancy(Lane::Front), 2);
}

#[test]
fn move_into_same_lane_discounts_vacated_seat() {
    let mut f = Formation::<6>::new(FormationPolicy {
        max_total: None,
        max_per_lane: Some(1),
    });
    f.assign(0, Some(hero("a"))).unwrap();
    assert_eq!(
        f.assign(1, Some(hero("a"))).unwrap(),
        Transition::Moved {
            from: 0,
            previous: None
        }
    );
    assert_eq!(f.lane_occupancy(Lane::Back), 1);
}

#[test]
fn moving_onto_an_occupied_seat_reports_the_evicted_asset() {
    let mut f = CharacterFormation::characters();
    f.assign(0, Some(hero("a"))).unwrap();
    f.assign(2, Some(hero("b"))).unwrap();

    let t = f.assign(2, Some(hero("a"))).unwrap();
    assert_eq!(
        t,
        Transition::Moved {
            from: 0,
            previous: Some(hero("b"))
        }
    );
    assert!(t.changed());
    assert_eq!(f.position_of("a"), Some(2));
    assert_eq!(f.position_of("b"), None);
    assert_eq!(f.occupied(), 1);
}

#[test]
fn replacement_is_allowed_at_capacity() {
    let mut f = CharacterFormation::characters();
    for (pos, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        f.assign(pos, Some(hero(id))).unwrap();
    }
    let t = f.assign(0, Some(hero("z"))).unwrap();
    assert_eq!(t, Transition::Replaced { previous: hero("a") });
    assert_eq!(f.occupied(), 5);
    assert_eq!(f.position_of("z"), Some(0));
    assert_eq!(f.position_of("a"), None);
}

#[test]
fn clearing_is_unconditional() {
    let mut f = CharacterFormation::characters();
    assert_eq!(f.assign(4, None).unwrap(), Transition::Cleared);
    f.assign(4, Some(hero("a"))).unwrap();
    assert_eq!(f.assign(4, None).unwrap(), Transition::Cleared);
    assert_eq!(f.occupied(), 0);
}

#[test]
fn out_of_range_position_is_an_error() {
    let mut f = PetFormation::pets();
    assert!(matches!(
        f.assign(3, Some(hero("p"))),
        Err(RosterError::Validation(_))
    ));
    assert!(f.state(3).is_err());
    assert!(f.get(3).is_none());
}

#[test]
fn pet_formation_relocates_without_limits() {
    let mut f = PetFormation::pets();
    f.assign(0, Some(hero("p1"))).unwrap();
    f.assign(1, Some(hero("p2"))).unwrap();
    f.assign(2, Some(hero("p3"))).unwrap();
    assert_eq!(
        f.assign(0, Some(hero("p3"))).unwrap(),
        Transition::Moved {
            from: 2,
            previous: Some(hero("p1"))
        }
    );
    assert_eq!(f.get(0).unwrap().id, "p3");
    assert_eq!(f.position_of("p1"), None);
    assert!(f.get(2).is_none());
    assert_eq!(f.occupied(), 2);
}

#[test]
fn random_sequences_respect_capacity_and_uniqueness() {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut f = CharacterFormation::characters();
    for _ in 0..5_000 {
        let pos = (next() % 6) as usize;
        let pick = next() % 9;
        let asset = (pick < 8).then(|| hero(&format!("h{pick}")));
        f.assign(pos, asset).unwrap();

        assert!(f.occupied() <= 5);
        for lane in Lane::ALL {
            assert!(f.lane_occupancy(lane) <= 2);
        }
        let mut ids: Vec<_> = f.positions().iter().flatten().map(|a| &a.id).collect();
        let n = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n);
    }
}
