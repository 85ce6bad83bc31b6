// Compositor Module - Blends the current and next pattern into the frame buffer
use crate::layout::Position;
use crate::types::Rgb;

/// Overwrite each active slot with `current`, then fade `next` in over it by
/// `mix / 255`. The current pattern is always the baseline; at mix 0 the
/// buffer is exactly `current`. Inactive slots are never written.
pub fn composite(buffer: &mut [Rgb], positions: &[Position], current: &[Rgb], next: &[Rgb], mix: u8) {
    for p in positions.iter().filter(|p| p.active) {
        let i = p.index;
        buffer[i] = buffer[i].blend(current[i], 255);
        buffer[i] = buffer[i].blend(next[i], mix);
    }
}

/// Paint the background colour for slots with no LED behind them.
pub fn fill_inactive(buffer: &mut [Rgb], positions: &[Position], color: Rgb) {
    for p in positions.iter().filter(|p| !p.active) {
        buffer[p.index] = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{build_layout, LayoutConfiguration, RingSpec};
    use proptest::prelude::*;

    fn small_layout() -> Vec<Position> {
        build_layout(&LayoutConfiguration {
            slots_per_ring: 6,
            rings: vec![RingSpec::new(4.0, 10.0, 0.0)],
        })
    }

    #[test]
    fn test_mix_zero_is_current_exactly() {
        let positions = small_layout();
        let current = vec![Rgb::new(9, 99, 199); 6];
        let next = vec![Rgb::WHITE; 6];
        let mut buffer = vec![Rgb::new(50, 50, 50); 6];
        composite(&mut buffer, &positions, &current, &next, 0);
        assert_eq!(&buffer[..4], &current[..4]);
    }

    #[test]
    fn test_mix_full_is_next_exactly() {
        let positions = small_layout();
        let current = vec![Rgb::RED; 6];
        let next = vec![Rgb::BLUE; 6];
        let mut buffer = vec![Rgb::BLACK; 6];
        composite(&mut buffer, &positions, &current, &next, 255);
        assert!(buffer[..4].iter().all(|c| *c == Rgb::BLUE));
    }

    #[test]
    fn test_inactive_slots_keep_background() {
        let positions = small_layout();
        let mut buffer = vec![Rgb::BLACK; 6];
        fill_inactive(&mut buffer, &positions, Rgb::GREEN);
        composite(&mut buffer, &positions, &[Rgb::RED; 6], &[Rgb::BLUE; 6], 128);
        assert_eq!(buffer[4], Rgb::GREEN);
        assert_eq!(buffer[5], Rgb::GREEN);
        assert_ne!(buffer[0], Rgb::GREEN);
    }

    proptest! {
        #[test]
        fn result_lies_between_current_and_next(
            c in any::<(u8, u8, u8)>(),
            n in any::<(u8, u8, u8)>(),
            prior in any::<(u8, u8, u8)>(),
            mix in any::<u8>(),
        ) {
            let positions = small_layout();
            let current = vec![Rgb::new(c.0, c.1, c.2); 6];
            let next = vec![Rgb::new(n.0, n.1, n.2); 6];
            let mut buffer = vec![Rgb::new(prior.0, prior.1, prior.2); 6];
            composite(&mut buffer, &positions, &current, &next, mix);
            let out = buffer[0];
            for (o, a, b) in [(out.r, c.0, n.0), (out.g, c.1, n.1), (out.b, c.2, n.2)] {
                prop_assert!(o >= a.min(b) && o <= a.max(b));
            }
        }
    }
}
