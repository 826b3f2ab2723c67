use crossterm::event::KeyCode as CrosstermKey;
use device_query::Keycode as DeviceKey;

pub const KEY_COUNT: usize = 16;

// Physical keys of the reference layout
//   1 2 3 4        1 2 3 C
//   Q W E R   ->   4 5 6 D
//   A S D F        7 8 9 E
//   Z X C V        A 0 B F
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    One,
    Two,
    Three,
    Four,
    Q,
    W,
    E,
    R,
    A,
    S,
    D,
    F,
    Z,
    X,
    C,
    V,
}

pub const KEY_ORDERING: [Key; KEY_COUNT] = [
    Key::One,
    Key::Two,
    Key::Three,
    Key::Four,
    Key::Q,
    Key::W,
    Key::E,
    Key::R,
    Key::A,
    Key::S,
    Key::D,
    Key::F,
    Key::Z,
    Key::X,
    Key::C,
    Key::V,
];

impl Key {
    // Key enum to the hex key code seen by CHIP-8 programs
    pub fn to_code(self) -> u8 {
        match self {
            Key::One => 0x1,
            Key::Two => 0x2,
            Key::Three => 0x3,
            Key::Four => 0xC,
            Key::Q => 0x4,
            Key::W => 0x5,
            Key::E => 0x6,
            Key::R => 0xD,
            Key::A => 0x7,
            Key::S => 0x8,
            Key::D => 0x9,
            Key::F => 0xE,
            Key::Z => 0xA,
            Key::X => 0x0,
            Key::C => 0xB,
            Key::V => 0xF,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Key::One => '1',
            Key::Two => '2',
            Key::Three => '3',
            Key::Four => '4',
            Key::Q => 'Q',
            Key::W => 'W',
            Key::E => 'E',
            Key::R => 'R',
            Key::A => 'A',
            Key::S => 'S',
            Key::D => 'D',
            Key::F => 'F',
            Key::Z => 'Z',
            Key::X => 'X',
            Key::C => 'C',
            Key::V => 'V',
        }
    }
}

impl TryFrom<char> for Key {
    type Error = &'static str;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        KEY_ORDERING
            .into_iter()
            .find(|key| key.to_char() == c.to_ascii_uppercase())
            .ok_or("not a valid key")
    }
}

impl TryFrom<u8> for Key {
    type Error = &'static str;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        KEY_ORDERING
            .into_iter()
            .find(|key| key.to_code() == code)
            .ok_or("not a valid key code")
    }
}

impl TryFrom<DeviceKey> for Key {
    type Error = &'static str;

    fn try_from(key: DeviceKey) -> Result<Self, Self::Error> {
        match key {
            DeviceKey::Key1 => Ok(Key::One),
            DeviceKey::Key2 => Ok(Key::Two),
            DeviceKey::Key3 => Ok(Key::Three),
            DeviceKey::Key4 => Ok(Key::Four),
            DeviceKey::Q => Ok(Key::Q),
            DeviceKey::W => Ok(Key::W),
            DeviceKey::E => Ok(Key::E),
            DeviceKey::R => Ok(Key::R),
            DeviceKey::A => Ok(Key::A),
            DeviceKey::S => Ok(Key::S),
            DeviceKey::D => Ok(Key::D),
            DeviceKey::F => Ok(Key::F),
            DeviceKey::Z => Ok(Key::Z),
            DeviceKey::X => Ok(Key::X),
            DeviceKey::C => Ok(Key::C),
            DeviceKey::V => Ok(Key::V),
            _ => Err("not a valid key"),
        }
    }
}

impl TryFrom<CrosstermKey> for Key {
    type Error = &'static str;

    fn try_from(key: CrosstermKey) -> Result<Self, Self::Error> {
        match key {
            CrosstermKey::Char(c) => Key::try_from(c),
            _ => Err("not a valid key"),
        }
    }
}

// The 16 key states read by the interpreter, bit n is key n (1 is down)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keypad {
    down_keys: u16,
}

impl Keypad {
    pub fn set(&mut self, code: u8, pressed: bool) {
        let mask = 1 << (code & 0xF);
        if pressed {
            self.down_keys |= mask;
        } else {
            self.down_keys &= !mask;
        }
    }

    // Codes above 0xF are never pressed
    pub fn is_pressed(&self, code: u8) -> bool {
        code < KEY_COUNT as u8 && self.down_keys >> code & 1 == 1
    }

    pub fn lowest_pressed(&self) -> Option<u8> {
        if self.down_keys == 0 {
            None
        } else {
            Some(self.down_keys.trailing_zeros() as u8)
        }
    }

    pub fn bits(&self) -> u16 {
        self.down_keys
    }
}

// Keyboard holds the host-side key state that gets flushed into the interpreter keypad each tick
#[derive(Debug, Default, Clone, Copy)]
pub struct Keyboard {
    focused: bool,

    // bitmap of the keys held down while the terminal is focused, a 1 is key down and a 0 is key up
    focused_down_keys: u16,
}

impl Keyboard {
    // on terminal focus
    pub fn handle_focus(&mut self) {
        if !self.focused {
            self.focused = true;
            log::info!("focus gained");
        }
    }

    // on terminal unfocus
    pub fn handle_unfocus(&mut self) {
        self.focused = false;
        self.focused_down_keys = 0;

        log::info!("clearing pressed keys because of focus lost");
    }

    // we default focused to false but the terminal may never fire a focus event (or not support them at all)
    // so a key event from the terminal while unfocused means we are in fact focused
    // the trigger key is applied here because device_query may have already reported it before we were focused
    pub fn handle_focusing_key_down(&mut self, key: Key) {
        if !self.focused {
            self.handle_focus();
            self.handle_key_down(key);
        }
    }

    pub fn handle_key_down(&mut self, key: Key) {
        if !self.focused {
            return;
        }

        if self.focused_down_keys >> key.to_code() & 1 == 0 {
            self.focused_down_keys |= 1 << key.to_code();

            log::debug!("key bitmap {:#018b}", self.focused_down_keys);
            log::info!("pressed key {:?} code {:X?}", key, key.to_code());
        }
    }

    pub fn handle_key_up(&mut self, key: Key) {
        if !self.focused {
            return;
        }

        if self.focused_down_keys >> key.to_code() & 1 == 1 {
            self.focused_down_keys &= !(1 << key.to_code());

            log::debug!("key bitmap {:#018b}", self.focused_down_keys);
            log::info!("released key {:?} code {:X?}", key, key.to_code());
        }
    }

    // Update the interpreter keypad with the current keyboard state
    pub fn flush(&self, keypad: &mut Keypad) {
        for code in 0..KEY_COUNT as u8 {
            keypad.set(code, self.focused_down_keys >> code & 1 == 1);
        }

        log::trace!("keypad bitmap {:#018b}", keypad.bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_layout_maps_to_hex_codes() {
        let codes: Vec<u8> = KEY_ORDERING.iter().map(|key| key.to_code()).collect();
        assert_eq!(
            codes,
            [0x1, 0x2, 0x3, 0xC, 0x4, 0x5, 0x6, 0xD, 0x7, 0x8, 0x9, 0xE, 0xA, 0x0, 0xB, 0xF]
        );

        for code in 0..16u8 {
            assert_eq!(Key::try_from(code).map(Key::to_code), Ok(code));
        }
        assert!(Key::try_from(0x10u8).is_err());
    }

    #[test]
    fn chars_are_case_insensitive() {
        assert_eq!(Key::try_from('q'), Ok(Key::Q));
        assert_eq!(Key::try_from('Q'), Ok(Key::Q));
        assert_eq!(Key::try_from(CrosstermKey::Char('4')), Ok(Key::Four));
        assert!(Key::try_from('p').is_err());
        assert!(Key::try_from(CrosstermKey::Enter).is_err());
    }

    #[test]
    fn keypad_reports_lowest_pressed_key() {
        let mut keypad = Keypad::default();
        assert_eq!(keypad.lowest_pressed(), None);

        keypad.set(0xB, true);
        keypad.set(0x5, true);
        assert_eq!(keypad.lowest_pressed(), Some(0x5));
        assert!(keypad.is_pressed(0xB));
        assert!(!keypad.is_pressed(0x20));

        keypad.set(0x5, false);
        assert_eq!(keypad.lowest_pressed(), Some(0xB));
    }

    #[test]
    fn keyboard_ignores_keys_until_focused() {
        let mut keyboard = Keyboard::default();
        let mut keypad = Keypad::default();

        keyboard.handle_key_down(Key::W);
        keyboard.flush(&mut keypad);
        assert_eq!(keypad.bits(), 0);

        keyboard.handle_focusing_key_down(Key::W);
        keyboard.flush(&mut keypad);
        assert!(keypad.is_pressed(0x5));

        keyboard.handle_unfocus();
        keyboard.flush(&mut keypad);
        assert_eq!(keypad.bits(), 0);
    }

    #[test]
    fn flush_replaces_every_keypad_state() {
        let mut keyboard = Keyboard::default();
        let mut keypad = Keypad::default();
        keypad.set(0xF, true);
        keypad.set(0x0, true);

        keyboard.handle_focusing_key_down(Key::Z);
        keyboard.handle_key_down(Key::Four);
        keyboard.flush(&mut keypad);

        assert_eq!(keypad.bits(), 1 << 0xA | 1 << 0xC);
        assert_eq!(keypad.lowest_pressed(), Some(0xA));
    }
}
