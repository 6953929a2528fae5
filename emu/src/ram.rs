use crate::bus::*;

pub struct Ram {
    ram: Vec<u8>,
}

impl Ram {
    pub fn new(len: usize) -> Self {
        Self { ram: vec![0; len] }
    }

    pub fn from_image(mut image: Vec<u8>, len: usize) -> Self {
        image.resize(len, 0);
        Self { ram: image }
    }

    pub fn len(&self) -> usize {
        self.ram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ram.is_empty()
    }
}

macro_rules! gen {
    ($l: tt $s: tt $t: tt $sz: tt) => {
        fn $l(&mut self, offset: u64) -> Result<$t, BusError> {
            match self.ram.get(offset as usize..(offset as usize).saturating_add($sz)) {
                Some(b) => {
                    let mut bytes = [0; $sz];
                    bytes.copy_from_slice(b);
                    Ok($t::from_le_bytes(bytes))
                }
                None => Err(BusError::Unmapped(offset)),
            }
        }

        fn $s(&mut self, offset: u64, val: $t) -> Result<(), BusError> {
            match self.ram.get_mut(offset as usize..(offset as usize).saturating_add($sz)) {
                Some(b) => {
                    b.copy_from_slice(&val.to_le_bytes());
                    Ok(())
                }
                None => Err(BusError::Unmapped(offset)),
            }
        }
    };
}

impl Device for Ram {
    gen!(load_u8 store_u8 u8 1);
    gen!(load_u16 store_u16 u16 2);
    gen!(load_u32 store_u32 u32 4);
    gen!(load_u64 store_u64 u64 8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_views() {
        let mut ram = Ram::new(16);
        ram.store_u64(0, 0x0807_0605_0403_0201).unwrap();

        assert_eq!(ram.load_u8(0).unwrap(), 0x01);
        assert_eq!(ram.load_u16(2).unwrap(), 0x0403);
        assert_eq!(ram.load_u32(4).unwrap(), 0x0807_0605);
    }

    #[test]
    fn image_is_padded() {
        let mut ram = Ram::from_image(vec![0xaa, 0xbb], 8);
        assert_eq!(ram.len(), 8);
        assert_eq!(ram.load_u16(0).unwrap(), 0xbbaa);
        assert_eq!(ram.load_u8(7).unwrap(), 0);
    }

    #[test]
    fn out_of_range() {
        let mut ram = Ram::new(4);
        assert_eq!(ram.load_u32(1), Err(BusError::Unmapped(1)));
        assert_eq!(ram.store_u8(4, 0), Err(BusError::Unmapped(4)));
    }
}
