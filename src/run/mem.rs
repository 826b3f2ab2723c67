pub const MEMORY_SIZE: usize = 4096;

pub const PROGRAM_STARTING_ADDRESS: u16 = 0x200;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - PROGRAM_STARTING_ADDRESS as usize;

pub const FONT_STARTING_ADDRESS: u16 = 0x000; // store font in memory from 0x000 to 0x04F inclusive
pub const FONT_CHAR_DATA_SIZE: u8 = 5;
pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

pub type Memory = [u8; MEMORY_SIZE];

// Addresses handed to these traits are taken modulo the memory length so
// transfers that run off the end of memory continue from address 0
pub trait MemoryRef {
    fn export(&self, address: u16, dst: &mut [u8]);
}

pub trait MemoryMut {
    fn import(&mut self, src: &[u8], address: u16);
}

impl<T> MemoryRef for T
where
    T: AsRef<[u8]> + ?Sized,
{
    fn export(&self, address: u16, dst: &mut [u8]) {
        let memory = self.as_ref();
        let address = address as usize % memory.len();

        let pivot = dst.len().min(memory.len() - address);
        let (dst0, dst1) = dst.split_at_mut(pivot);

        dst0.copy_from_slice(&memory[address..address + dst0.len()]);
        for chunk in dst1.chunks_mut(memory.len()) {
            chunk.copy_from_slice(&memory[..chunk.len()]);
        }
    }
}

impl<T> MemoryMut for T
where
    T: AsMut<[u8]> + ?Sized,
{
    fn import(&mut self, src: &[u8], address: u16) {
        let memory = self.as_mut();
        let address = address as usize % memory.len();

        let pivot = src.len().min(memory.len() - address);
        let (src0, src1) = src.split_at(pivot);

        memory[address..address + src0.len()].copy_from_slice(src0);
        for chunk in src1.chunks(memory.len()) {
            memory[..chunk.len()].copy_from_slice(chunk);
        }
    }
}

// Zeroed memory with the font installed
pub fn alloc() -> Memory {
    let mut memory = [0; MEMORY_SIZE];
    memory.import(&FONT, FONT_STARTING_ADDRESS);
    memory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_installs_font_only() {
        let memory = alloc();
        assert_eq!(&memory[..80], &FONT[..]);
        assert!(memory[80..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn export_wraps_past_end_of_memory() {
        let mut memory = [0u8; MEMORY_SIZE];
        memory[MEMORY_SIZE - 1] = 0xAB;
        memory[0] = 0xCD;
        memory[1] = 0xEF;

        let mut dst = [0; 3];
        memory.export(0xFFF, &mut dst);
        assert_eq!(dst, [0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn import_wraps_past_end_of_memory() {
        let mut memory = [0u8; MEMORY_SIZE];
        memory.import(&[1, 2, 3], 0xFFE);
        assert_eq!(memory[0xFFE], 1);
        assert_eq!(memory[0xFFF], 2);
        assert_eq!(memory[0x000], 3);
    }
}
